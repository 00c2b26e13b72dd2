use serde_json::{Map, Value};

use crate::payload::{self, UpstreamPayload};
use crate::tools::ToolKind;
use crate::{format, validate, Result};

/// Anything that can carry an [`UpstreamPayload`] to the Metaso API and hand back the parsed body.
#[async_trait::async_trait]
pub trait Upstream: Send + Sync {
    async fn execute(&self, payload: &UpstreamPayload) -> Result<Value>;
}

/// validate -> build payload -> upstream -> format, for one tool call.
///
/// Validation and safety failures return before `upstream` is touched.
pub async fn run(
    upstream: &dyn Upstream,
    kind: ToolKind,
    args: Option<&Map<String, Value>>,
) -> Result<Value> {
    let req = validate::validate(kind, args)?;
    let payload = payload::build(&req);
    let body = upstream.execute(&payload).await?;
    Ok(format::format(&req, body))
}
