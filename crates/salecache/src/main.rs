use std::path::PathBuf;
use std::sync::Arc;

use color_eyre::eyre;
use structopt::StructOpt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use feed::{GraphqlClient, GraphqlInventory, GraphqlSaleFeed, InventoryProvider, JsonFileInventory};
use salecache::{
    sweep, AppConfig, IngestionCoordinator, SaleRecordRepository, SqliteSaleRecordStore,
    ValuationConfig,
};

mod report;

// lib.rs에서 자동으로 dotenv가 로드됨

#[derive(Debug, StructOpt)]
#[structopt(name = "salecache", about = "거래 기록 캐시 및 시간 감쇠 가치 추정")]
struct Opt {
    /// 인벤토리 JSON 파일 (없으면 GraphQL에서 보유 카드를 읽는다)
    #[structopt(long, parse(from_os_str))]
    inventory: Option<PathBuf>,

    /// SQLite 파일 경로 (DB_PATH 대신)
    #[structopt(long, parse(from_os_str))]
    db: Option<PathBuf>,

    /// 동시에 수집할 아이템 수 (INGEST_CONCURRENCY 대신)
    #[structopt(long)]
    concurrency: Option<usize>,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// 인벤토리 아이템의 거래 기록 갱신
    Refresh,
    /// 갱신 후 감쇠율별 추정 가치 출력
    Value {
        /// JSON으로 출력
        #[structopt(long)]
        json: bool,
        /// 쉼표로 구분한 감쇠율 (VALUATION_DECAY_RATES 대신)
        #[structopt(long)]
        decay: Option<String>,
    },
    /// 아이템별 저장된 거래 수와 워터마크
    Status,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // init error reporting
    color_eyre::install()?;

    // init logging
    let _guards = salecache::logger::init_tracing();

    let opt = Opt::from_args();
    let mut config =
        AppConfig::from_env().map_err(|e| eyre::eyre!("설정 읽기 실패: {}", e))?;
    if let Some(path) = opt.inventory {
        config.inventory_path = Some(path);
    }
    if let Some(path) = opt.db {
        config.db_path = path;
    }
    if let Some(concurrency) = opt.concurrency {
        config.ingest.concurrency = concurrency;
    }
    config
        .ingest
        .validate()
        .map_err(|e| eyre::eyre!("설정 오류: {}", e))?;

    // init sale record repository
    let store = SqliteSaleRecordStore::open(&config.db_path)
        .await
        .map_err(|e| eyre::eyre!("거래 기록 저장소 초기화 실패: {}", e))?;
    let store: Arc<dyn SaleRecordRepository> = Arc::new(store);

    match opt.cmd {
        Command::Refresh => run_refresh(&config, store).await,
        Command::Value { json, decay } => {
            if let Some(raw) = decay {
                config.valuation = salecache::config::parse_decay_rates(&raw)
                    .and_then(ValuationConfig::new)
                    .map_err(|e| eyre::eyre!("감쇠율 오류: {}", e))?;
            }
            run_value(&config, store, json).await
        }
        Command::Status => run_status(&config, store).await,
    }
}

fn graphql_client(config: &AppConfig) -> GraphqlClient {
    GraphqlClient::with_credentials(
        config.feed.endpoint.clone(),
        config.feed.token.clone(),
        config.feed.audience.clone(),
    )
}

fn inventory_provider(config: &AppConfig) -> Box<dyn InventoryProvider> {
    match &config.inventory_path {
        Some(path) => Box::new(JsonFileInventory::new(path.clone())),
        None => Box::new(GraphqlInventory::new(
            graphql_client(config),
            config.ingest.page_size,
        )),
    }
}

/// Ctrl-C를 받으면 취소 토큰을 발동한다. 이미 커밋된 기록은 유지된다.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("중단 요청을 받았습니다. 진행 중인 아이템을 정리합니다...");
            child.cancel();
        }
    });
    token
}

async fn refresh(
    config: &AppConfig,
    store: Arc<dyn SaleRecordRepository>,
) -> eyre::Result<(Vec<interface::InventoryItem>, salecache::RefreshReport)> {
    let inventory = inventory_provider(config);
    let items = inventory
        .items()
        .await
        .map_err(|e| eyre::eyre!("인벤토리 조회 실패: {}", e))?;
    info!("인벤토리 아이템 {}개", items.len());

    let feed = Arc::new(GraphqlSaleFeed::new(graphql_client(config)));
    let coordinator = IngestionCoordinator::new(store, feed, config.ingest.clone());

    let cancel = cancel_on_ctrl_c();
    let report = coordinator
        .refresh(&items, &cancel)
        .await
        .map_err(|e| eyre::eyre!("거래 기록 갱신 실패: {}", e))?;

    Ok((items, report))
}

async fn run_refresh(config: &AppConfig, store: Arc<dyn SaleRecordRepository>) -> eyre::Result<()> {
    info!("거래 기록 갱신 시작...");

    let (_, report) = refresh(config, store).await?;
    report::print_summary(&report);

    info!("완료!");
    Ok(())
}

async fn run_value(
    config: &AppConfig,
    store: Arc<dyn SaleRecordRepository>,
    json: bool,
) -> eyre::Result<()> {
    info!(
        "가치 추정 시작 (감쇠율: {:?})...",
        config.valuation.decay_rates
    );

    let (items, report) = refresh(config, store).await?;
    let table = sweep(&report.window, &config.valuation.decay_rates).with_purchase_prices(&items);

    if json {
        println!("{}", serde_json::to_string_pretty(&table)?);
    } else {
        report::print_summary(&report);
        report::print_table(&table);
    }

    Ok(())
}

async fn run_status(config: &AppConfig, store: Arc<dyn SaleRecordRepository>) -> eyre::Result<()> {
    let items = inventory_provider(config)
        .items()
        .await
        .map_err(|e| eyre::eyre!("인벤토리 조회 실패: {}", e))?;

    let total = store
        .count(None)
        .await
        .map_err(|e| eyre::eyre!("거래 수 조회 실패: {}", e))?;

    let mut lines = Vec::with_capacity(items.len());
    for item in &items {
        let count = store.count(Some(item.item_id.as_str())).await?;
        let watermark = store.max_date(&item.item_id).await?;
        lines.push(report::StatusLine {
            item_id: item.item_id.clone(),
            count,
            watermark,
        });
    }

    report::print_status(&config.db_path, total, &lines);
    Ok(())
}
