use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use storefront_catalog::{default_storefront_home, LocalCatalog, StorefrontLayout};
use storefront_planner::{ChangePlanner, LocalPlanner};
use storefront_selection::{ButtonStateController, SelectionModel};

use crate::completion::write_completions_script;
use crate::render::{
    current_output_style, format_entry_lines, format_listing_line, format_show_lines,
    format_unavailable_lines, severity_status, TerminalRenderer,
};
use crate::session::{
    lookup_listing, replay_interactions, resolve_feature_names, restore_session, session_report,
    SessionRequest,
};
use crate::{Cli, Commands};

pub(crate) fn run_cli(cli: Cli) -> Result<()> {
    let renderer = TerminalRenderer::from_style(current_output_style(cli.plain));

    match cli.command {
        Commands::List { query } => {
            let catalog = open_catalog(cli.catalog_root.as_deref(), cli.state_root.as_deref())?;
            let model = SelectionModel::for_resolver(catalog.as_ref());
            let listings = catalog.search(query.as_deref().unwrap_or(""))?;
            if listings.is_empty() {
                renderer.print_status("warn", "no listings found");
            }
            for listing in listings {
                let receipt = catalog.receipt(listing.id());
                let controller =
                    ButtonStateController::new(listing.clone(), &model, catalog.as_ref());
                println!(
                    "{}",
                    format_listing_line(renderer.style(), &listing, receipt, &controller)
                );
            }
        }
        Commands::Show { id, token } => {
            let catalog = open_catalog(cli.catalog_root.as_deref(), cli.state_root.as_deref())?;
            let listing = lookup_listing(&catalog, &id)?;
            let session = restore_session(
                &catalog,
                token.as_deref().unwrap_or(""),
                &Default::default(),
                renderer,
            )?;
            let controller =
                ButtonStateController::new(listing.clone(), &session.model, catalog.as_ref());
            renderer.print_lines(&format_show_lines(
                renderer.style(),
                &listing,
                catalog.receipt(listing.id()),
                &controller,
            ));
        }
        Commands::Session {
            token,
            set,
            click,
            choose,
            uncheck,
            url,
            json,
        } => {
            let request =
                SessionRequest::from_args(token.as_deref(), url, &set, &click, &choose, &uncheck)?;
            let catalog = open_catalog(cli.catalog_root.as_deref(), cli.state_root.as_deref())?;
            let mut session =
                restore_session(&catalog, &request.token, &request.overrides, renderer)?;
            replay_interactions(&mut session, &catalog, &request)?;
            resolve_feature_names(&mut session, &catalog, renderer)?;
            let report = session_report(&session, url);

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&report)
                        .context("failed to serialize session report")?
                );
                return Ok(());
            }

            renderer.print_section("Selection");
            renderer.print_lines(&format_entry_lines(renderer.style(), &session.model));
            let viability_status = if report.viability.is_viable() {
                "ok"
            } else {
                "error"
            };
            renderer.print_status(viability_status, &report.viability.message());
            if !report.unavailable.is_empty() {
                renderer.print_section("Unavailable");
                for line in format_unavailable_lines(&report.unavailable) {
                    renderer.print_status("warn", &line);
                }
            }
            renderer.print_section("Token");
            println!("{}", report.token);
        }
        Commands::Plan {
            token,
            set,
            url,
            json,
        } => {
            let request = SessionRequest::from_args(token.as_deref(), url, &set, &[], &[], &[])?;
            let catalog = open_catalog(cli.catalog_root.as_deref(), cli.state_root.as_deref())?;
            let session = restore_session(&catalog, &request.token, &request.overrides, renderer)?;
            let planner = LocalPlanner::from_catalog(&catalog)?;
            let plan = planner.compute_change_plan(&session.model);

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&plan).context("failed to serialize plan")?
                );
                return Ok(());
            }

            for line in format_unavailable_lines(session.serializer.unavailable_items()) {
                renderer.print_status("warn", &line);
            }
            renderer.print_lines(&plan.preview_lines());
            let summary = plan
                .details
                .first()
                .map(String::as_str)
                .unwrap_or("plan computed");
            renderer.print_status(severity_status(plan.severity), summary);
        }
        Commands::Completions { shell } => {
            let mut stdout = std::io::stdout().lock();
            write_completions_script(shell, "storefront", &mut stdout)?;
            stdout.flush().context("failed flushing completion script")?;
        }
    }

    Ok(())
}

pub(crate) fn resolve_layout(
    catalog_root: Option<&Path>,
    state_root: Option<&Path>,
) -> Result<StorefrontLayout> {
    if let (Some(catalog_root), Some(state_root)) = (catalog_root, state_root) {
        return Ok(StorefrontLayout::with_roots(catalog_root, state_root));
    }
    let defaults = StorefrontLayout::new(default_storefront_home()?);
    Ok(StorefrontLayout::with_roots(
        catalog_root.unwrap_or(defaults.catalog_root()),
        state_root.unwrap_or(defaults.state_root()),
    ))
}

fn open_catalog(catalog_root: Option<&Path>, state_root: Option<&Path>) -> Result<Arc<LocalCatalog>> {
    let layout = resolve_layout(catalog_root, state_root)?;
    tracing::debug!(
        "opening catalog {} with state {}",
        layout.catalog_root().display(),
        layout.state_root().display()
    );
    let catalog = LocalCatalog::open(&layout).with_context(|| {
        format!(
            "failed to open catalog state: {}",
            layout.state_root().display()
        )
    })?;
    Ok(Arc::new(catalog))
}
