use std::path::Path;

use chrono::{DateTime, Utc};

use salecache::{RefreshReport, ValuationTable};

/// status 명령의 한 줄
pub struct StatusLine {
    pub item_id: String,
    pub count: u64,
    pub watermark: Option<DateTime<Utc>>,
}

pub fn print_summary(report: &RefreshReport) {
    let summary = &report.summary;
    println!("\n=== 갱신 결과 ===");
    println!("  성공: {}", summary.succeeded);
    println!("  실패: {}", summary.failed.len());
    for failed in &summary.failed {
        println!("    - {}: {}", failed.item_id, failed.reason);
    }
    println!("  건너뜀: {}", summary.skipped.len());
    println!("  페이지: {}", summary.fetched_pages);
    println!("  새 거래: {}", summary.inserted);
    println!("  버린 거래: {}", summary.dropped);
    println!("  윈도우 크기: {}", report.window.len());
}

pub fn print_table(table: &ValuationTable) {
    println!("\n=== 추정 가치 ===");
    if table.is_empty() {
        println!("  (데이터 없음)");
        return;
    }
    print!("{}", table.render());
}

pub fn print_status(db_path: &Path, total: u64, lines: &[StatusLine]) {
    println!("\n=== 저장소 상태 ({}) ===", db_path.display());
    println!("  전체 거래 수: {}", total);

    let width = lines.iter().map(|l| l.item_id.len()).max().unwrap_or(0);
    for line in lines {
        let watermark = line
            .watermark
            .map(|d| d.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<width$}  {:>6}  {}",
            line.item_id,
            line.count,
            watermark,
            width = width
        );
    }
}
