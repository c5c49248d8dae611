use anyhow::anyhow;
use backoffice_api_models::ItemId;
use backoffice_client::report::query::{ORDER_PARAM, PAGE_PARAM};
use backoffice_client::report::{
    ActionOutcome, BulkOutcome, ConfirmedOutcome, ReportListController,
};
use backoffice_client::{QueryParams, ViewSession};
use tracing::debug;

use crate::cli::{
    OutputFormat, ReportActionArgs, ReportBulkArgs, ReportLinkArgs, ReportListArgs,
    ReportQueryArgs,
};
use crate::client::{AppContext, CliError, CliResult, view_params};
use crate::output::{render_action_outcome, render_bulk_result, render_report};

pub(crate) async fn handle_report_list(
    ctx: &AppContext,
    args: ReportListArgs,
    output: OutputFormat,
) -> CliResult<()> {
    let controller = open_report(ctx, &args.query).await?;
    render_report(controller.state(), output)
}

pub(crate) async fn handle_report_action(
    ctx: &AppContext,
    args: ReportActionArgs,
    output: OutputFormat,
) -> CliResult<()> {
    let mut controller = open_report(ctx, &args.query).await?;
    let item_id = ItemId::new(args.item_id.trim());

    let outcome = match args.data.as_deref() {
        Some(data) => {
            controller
                .submit_form(&item_id, &args.method, data)
                .await?
        }
        None => {
            controller
                .execute_action(&item_id, &args.method, false)
                .await?
        }
    };

    let outcome = match outcome {
        ActionOutcome::AwaitingConfirmation(prompt) if args.yes => {
            debug!(%item_id, method = %args.method, %prompt, "confirmed from command line");
            match controller.confirm_pending().await? {
                ConfirmedOutcome::Action(outcome) => outcome,
                other => {
                    return Err(CliError::failure(anyhow!(
                        "unexpected confirmation result: {other:?}"
                    )));
                }
            }
        }
        ActionOutcome::AwaitingConfirmation(prompt) => {
            return Err(CliError::validation(format!(
                "{prompt} (re-run with --yes to confirm)"
            )));
        }
        ActionOutcome::OpenForm(action) => {
            let method = action.method.clone();
            render_action_outcome(&ActionOutcome::OpenForm(action), output)?;
            return Err(CliError::validation(format!(
                "action '{method}' requires form input (pass --data)"
            )));
        }
        other => other,
    };

    render_action_outcome(&outcome, output)?;
    if let ActionOutcome::FormErrors { action, .. } = &outcome {
        return Err(CliError::validation(format!(
            "form for action '{}' was rejected",
            action.method
        )));
    }
    Ok(())
}

pub(crate) async fn handle_report_bulk(
    ctx: &AppContext,
    args: ReportBulkArgs,
    output: OutputFormat,
) -> CliResult<()> {
    let mut controller = open_report(ctx, &args.query).await?;
    for item_id in &args.item_ids {
        controller
            .state_mut()
            .set_selected(ItemId::new(item_id.trim()), true);
    }
    if args.global {
        controller.state_mut().set_global_selection(true);
    }

    let outcome = match controller.execute_multiple_action(&args.method, false).await? {
        BulkOutcome::AwaitingConfirmation(_) if args.yes => {
            match controller.confirm_pending().await? {
                ConfirmedOutcome::Bulk(outcome) => outcome,
                other => {
                    return Err(CliError::failure(anyhow!(
                        "unexpected confirmation result: {other:?}"
                    )));
                }
            }
        }
        BulkOutcome::AwaitingConfirmation(prompt) => {
            return Err(CliError::validation(format!(
                "{prompt} (re-run with --yes to confirm)"
            )));
        }
        other => other,
    };

    match outcome {
        BulkOutcome::Skipped => Err(CliError::validation(format!(
            "bulk action '{}' is not available",
            args.method
        ))),
        BulkOutcome::Navigate(url) => {
            println!("{url}");
            Ok(())
        }
        BulkOutcome::Completed(result) => render_bulk_result(&result, output),
        BulkOutcome::AwaitingConfirmation(prompt) => Err(CliError::validation(prompt)),
    }
}

pub(crate) async fn handle_report_link(ctx: &AppContext, args: ReportLinkArgs) -> CliResult<()> {
    let controller = open_report(ctx, &args.query).await?;
    let item_id = ItemId::new(args.item_id.trim());
    let url = controller
        .action_link_for(&item_id, &args.method)?
        .ok_or_else(|| {
            CliError::validation(format!("action '{}' is not a link action", args.method))
        })?;
    println!("{url}");
    Ok(())
}

async fn open_report(ctx: &AppContext, query: &ReportQueryArgs) -> CliResult<ReportListController> {
    let session = ViewSession::new(ctx.api.clone(), view_params(&query.target)?)?;
    let mut controller = ReportListController::new(session, ctx.report_base.clone());
    controller.navigate(&search_params(query)).await?;
    Ok(controller)
}

fn search_params(query: &ReportQueryArgs) -> QueryParams {
    let mut params: QueryParams = query.filters.iter().cloned().collect();
    if let Some(order) = query.order.as_deref().filter(|order| !order.is_empty()) {
        params.insert(ORDER_PARAM, order);
    }
    if let Some(page) = query.page {
        params.insert(PAGE_PARAM, page.to_string());
    }
    params
}
