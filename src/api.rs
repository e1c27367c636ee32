//! Request router
//!
//! Translates method + path + JSON body into calls on a [`DiskService`] and
//! wraps the outcome in a JSON envelope:
//!
//! ```json
//! { "success": true, "data": { "fileId": 1 }, "error": null }
//! ```
//!
//! The router is transport-free; `src/bin/server.rs` feeds it from hyper.

use crate::core::allocator::PlacementStrategy;
use crate::core::error::DiskError;
use crate::core::host::{HostDiskProbe, StatvfsProbe};
use crate::core::registry::FileId;
use crate::DiskService;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

/// One inbound request
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: String,
    pub path: String,
    pub body: Vec<u8>,
}

impl ApiRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        ApiRequest {
            method: method.into(),
            path: path.into(),
            body: Vec::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }
}

/// Status code plus JSON envelope
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn ok(data: Value) -> Self {
        ApiResponse {
            status: 200,
            body: json!({ "success": true, "data": data, "error": null }),
        }
    }

    pub fn error(status: u16, message: impl Into<String>) -> Self {
        ApiResponse {
            status,
            body: json!({ "success": false, "data": null, "error": message.into() }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    pub fn to_json_string(&self) -> String {
        self.body.to_string()
    }
}

impl From<DiskError> for ApiResponse {
    fn from(err: DiskError) -> Self {
        ApiResponse::error(err.status_code(), err.to_string())
    }
}

#[derive(Debug, Default, Deserialize)]
struct SizeBody {
    size: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct CustomBody {
    size: Option<i64>,
    strategy: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CountBody {
    count: Option<i64>,
}

type Handled = std::result::Result<Value, ApiResponse>;

/// Empty bodies parse as all-defaults so missing fields hit range checks
fn parse_body<T>(body: &[u8]) -> std::result::Result<T, ApiResponse>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiResponse::error(400, format!("Invalid request: {}", e)))
}

fn positive(value: Option<i64>, name: &str) -> std::result::Result<usize, ApiResponse> {
    value
        .filter(|&v| v > 0)
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| ApiResponse::error(400, format!("{} must be positive", name)))
}

/// Route a request using the host's root filesystem for `/api/system-disk`
pub fn route(service: &mut DiskService, request: &ApiRequest) -> ApiResponse {
    route_with_probe(service, &StatvfsProbe::root(), request)
}

/// Route a request with an explicit host disk probe
pub fn route_with_probe(
    service: &mut DiskService,
    probe: &dyn HostDiskProbe,
    request: &ApiRequest,
) -> ApiResponse {
    let path = request.path.split('?').next().unwrap_or("");
    let method = request.method.to_ascii_uppercase();
    debug!("{} {}", method, path);

    let handled = match (method.as_str(), path) {
        ("POST", "/allocate/contiguous") => allocate_contiguous(service, &request.body),
        ("POST", "/allocate/fragmented") => allocate_fragmented(service, &request.body),
        ("POST", "/allocate/custom") => allocate_custom(service, &request.body),
        ("DELETE", p) if p.starts_with("/file/") => delete_file(service, &p["/file/".len()..]),
        ("POST", "/undelete/last") => undelete_last(service),
        ("POST", "/defragment") => {
            let moved = service.defragment();
            Ok(json!({ "defragmented": 1, "moved": moved }))
        }
        ("POST", "/mark-bad") => mark_bad(service, &request.body),
        ("POST", "/api/repair") => {
            let repaired = service.repair();
            Ok(json!({ "repaired": repaired }))
        }
        ("GET", "/fragmentation") => {
            let percent = (service.fragmentation_percent() * 100.0).round() / 100.0;
            Ok(json!({ "fragmentationPercent": percent }))
        }
        ("GET", "/api/disk/state") => Ok(json!({ "blocks": service.blocks() })),
        ("GET", "/api/disk/files") => Ok(json!({ "files": service.files() })),
        ("GET", "/api/disk/stats") => Ok(json!(service.stats())),
        ("GET", "/api/disk/logs") => Ok(json!({ "logs": service.logs() })),
        ("POST", "/api/disk/reset") => {
            service.reset();
            Ok(json!({ "reset": 1 }))
        }
        ("GET", "/api/system-disk") => probe
            .probe()
            .map(|info| json!(info))
            .map_err(ApiResponse::from),
        _ => Err(ApiResponse::error(404, "Endpoint not found")),
    };

    match handled {
        Ok(data) => ApiResponse::ok(data),
        Err(response) => response,
    }
}

fn allocate_contiguous(service: &mut DiskService, body: &[u8]) -> Handled {
    let body: SizeBody = parse_body(body)?;
    let size = positive(body.size, "size")?;
    let id = service.allocate_contiguous(size)?;
    Ok(json!({ "fileId": id }))
}

fn allocate_fragmented(service: &mut DiskService, body: &[u8]) -> Handled {
    let body: SizeBody = parse_body(body)?;
    let size = positive(body.size, "size")?;
    let id = service.allocate_fragmented(size)?;
    Ok(json!({ "fileId": id }))
}

fn allocate_custom(service: &mut DiskService, body: &[u8]) -> Handled {
    let body: CustomBody = parse_body(body)?;
    let size = positive(body.size, "size")?;
    let strategy = body
        .strategy
        .as_deref()
        .map(PlacementStrategy::parse_lenient)
        .unwrap_or_default();

    let id = service.allocate_custom(size, strategy)?;
    Ok(json!({ "fileId": id, "strategy": strategy }))
}

fn delete_file(service: &mut DiskService, raw_id: &str) -> Handled {
    let id = raw_id
        .parse::<u32>()
        .ok()
        .filter(|&id| id > 0)
        .map(FileId::new)
        .ok_or_else(|| ApiResponse::error(400, "Invalid file id"))?;

    let freed = service.delete(id)?;
    Ok(json!({ "deleted": 1, "fileId": id, "freed": freed }))
}

fn undelete_last(service: &mut DiskService) -> Handled {
    let restored = service.undelete_last()?;
    Ok(json!({
        "undeleted": 1,
        "fileId": restored.file_id,
        "blocks": restored.blocks,
        "relocated": restored.relocated,
    }))
}

fn mark_bad(service: &mut DiskService, body: &[u8]) -> Handled {
    let body: CountBody = parse_body(body)?;
    let count = positive(body.count, "count")?;
    let marked = service.mark_bad(count)?;
    Ok(json!({ "marked": marked, "requested": count }))
}
