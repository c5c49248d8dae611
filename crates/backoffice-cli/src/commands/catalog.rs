use backoffice_client::{SearchQuery, model_detail, search};

use crate::cli::{ModelGetArgs, OutputFormat, SearchArgs};
use crate::client::{AppContext, CliResult};
use crate::output::{render_model, render_search};

pub(crate) async fn handle_model_get(
    ctx: &AppContext,
    args: ModelGetArgs,
    output: OutputFormat,
) -> CliResult<()> {
    let instance = model_detail(&ctx.api, &args.model, &args.pk).await?;
    render_model(&instance, output)
}

pub(crate) async fn handle_search(
    ctx: &AppContext,
    args: SearchArgs,
    output: OutputFormat,
) -> CliResult<()> {
    let query = SearchQuery {
        q: args.q,
        page: args.page,
        filter_model: args.filter_model,
    };
    let results = search(&ctx.api, &query).await?;
    render_search(&results, output)
}
