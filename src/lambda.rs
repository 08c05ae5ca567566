use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use saas_skills::utils::logger;
use saas_skills::{load_catalog, Record, SkillRegistry};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

#[derive(Deserialize)]
pub struct Request {
    pub service: String,
    pub operation: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

#[derive(Serialize)]
pub struct Response {
    pub status: u16,
    pub body: Value,
    pub records: Vec<Record>,
}

async fn function_handler(
    registry: &SkillRegistry,
    event: LambdaEvent<Request>,
) -> Result<Response, Error> {
    let Request {
        service,
        operation,
        params,
    } = event.payload;
    tracing::info!("Lambda call {}.{}", service, operation);

    // 呼叫服務並整理成記錄
    let client = registry.client(&service)?;
    let response = client.call(&operation, &params).await?;
    let op = client.definition().operation(&operation)?;
    let records = response.records(
        op.response_key.as_deref(),
        op.field_mapping.as_ref(),
        op.max_records,
    );

    Ok(Response {
        status: response.status,
        body: response.body,
        records,
    })
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // 初始化日誌
    logger::init_lambda_logger();

    // 載入服務目錄 (可由環境變量覆寫)

    let catalog_path = std::env::var_os("SAAS_SKILLS_CATALOG").map(PathBuf::from);
    let catalog = load_catalog(catalog_path.as_deref())?;
    let registry = SkillRegistry::with_default_transport(catalog)?;
    let registry = &registry;

    run(service_fn(move |event| function_handler(registry, event))).await
}
