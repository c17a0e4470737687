use reqwest::Response;
use reqwest::header::HeaderName;
use tracing::debug;

use crate::credential::Credential;
use crate::csrf::CsrfToken;
use crate::decorator::decorate;
use crate::request_context::CallContext;
use crate::transport::Transport;

/// Resends the call's original request once with a freshly issued credential.
///
/// The caller's retry marker is already set by the time this runs, so a
/// second 401 from here is terminal.
pub async fn resend<T: Transport>(
    transport: &T,
    ctx: &CallContext,
    credential: &Credential,
    csrf: Option<&CsrfToken>,
    csrf_header: &HeaderName,
) -> Result<Response, reqwest::Error> {
    debug_assert!(ctx.retried(), "resend without retry marker");
    let request = decorate(ctx.request(), Some(credential), csrf, csrf_header);
    debug!(
        call_id = %ctx.id(),
        method = %ctx.request().method(),
        path = ctx.request().url().path(),
        "retry.dispatch"
    );
    transport.execute(request).await
}
