use backoffice_client::{PostOutcome, QueryParams, ViewSession};
use serde_json::Value;

use crate::cli::{OutputFormat, ViewActionArgs, ViewPostArgs, ViewTargetArgs};
use crate::client::{AppContext, CliError, CliResult, view_params};
use crate::output::{render_value, render_view};

pub(crate) async fn handle_view_get(
    ctx: &AppContext,
    args: ViewTargetArgs,
    output: OutputFormat,
) -> CliResult<()> {
    let session = ViewSession::open(ctx.api.clone(), view_params(&args)?).await?;
    render_view(session.content(), output)
}

pub(crate) async fn handle_view_post(
    ctx: &AppContext,
    args: ViewPostArgs,
    output: OutputFormat,
) -> CliResult<()> {
    let mut session = ViewSession::new(ctx.api.clone(), view_params(&args.target)?)?;
    let form: QueryParams = args.fields.into_iter().collect();

    match session.post(&form, None).await? {
        PostOutcome::Saved(_) => render_view(session.content(), output),
        PostOutcome::ValidationFailed(_) => {
            render_view(session.content(), output)?;
            Err(CliError::validation(format!(
                "form for view '{}' was rejected",
                session.slug()
            )))
        }
    }
}

pub(crate) async fn handle_view_action(
    ctx: &AppContext,
    args: ViewActionArgs,
    output: OutputFormat,
) -> CliResult<()> {
    let method = args.method.trim();
    if method.is_empty() {
        return Err(CliError::validation("method must not be empty"));
    }
    let params: Value = serde_json::from_str(&args.params_json)
        .map_err(|err| CliError::validation(format!("invalid --params JSON: {err}")))?;

    let mut session = ViewSession::new(ctx.api.clone(), view_params(&args.target)?)?;
    let response = session
        .action(method, &params, args.reload, args.suffix.as_deref())
        .await?;

    render_value(&response, output)?;
    if args.reload {
        render_view(session.content(), output)?;
    }
    Ok(())
}
