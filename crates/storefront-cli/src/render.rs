use std::io::IsTerminal;
use std::time::Duration;

use anstyle::{AnsiColor, Effects, Style};
use indicatif::{ProgressBar, ProgressStyle};
use storefront_catalog::InstallReceipt;
use storefront_core::{ListingRef, Severity};
use storefront_selection::{
    ButtonPresentation, ButtonStateController, FontStyle, SelectionModel, SelectionNode,
    UnavailableItem,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

pub(crate) fn current_output_style(plain: bool) -> OutputStyle {
    if plain || !std::io::stdout().is_terminal() {
        OutputStyle::Plain
    } else {
        OutputStyle::Rich
    }
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct TerminalRenderer {
    style: OutputStyle,
}

/// Spinner shown while a background resolve job runs. Rich output only.
pub(crate) struct ResolveSpinner {
    progress_bar: Option<ProgressBar>,
}

impl TerminalRenderer {
    pub(crate) fn from_style(style: OutputStyle) -> Self {
        Self { style }
    }

    pub(crate) fn style(self) -> OutputStyle {
        self.style
    }

    pub(crate) fn print_status(self, status: &str, message: &str) {
        println!("{}", render_status_line(self.style, status, message));
    }

    pub(crate) fn print_section(self, title: &str) {
        if self.style == OutputStyle::Rich {
            println!();
            println!("{}", colorize(section_style(), &format!("== {title} ==")));
        }
    }

    pub(crate) fn print_lines(self, lines: &[String]) {
        for line in lines {
            println!("{line}");
        }
    }

    pub(crate) fn start_spinner(self, label: &str) -> ResolveSpinner {
        let progress_bar = if self.style == OutputStyle::Rich {
            let progress_bar = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan.bold} {msg} {elapsed}")
            {
                progress_bar.set_style(style.tick_chars("|/-\\ "));
            }
            progress_bar.set_message(format!("resolving {label}"));
            progress_bar.enable_steady_tick(Duration::from_millis(80));
            Some(progress_bar)
        } else {
            None
        };
        ResolveSpinner { progress_bar }
    }
}

impl ResolveSpinner {
    pub(crate) fn finish(mut self) {
        if let Some(progress_bar) = self.progress_bar.take() {
            progress_bar.finish_and_clear();
        }
    }
}

pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => format!("[{}] {}", status_badge(status), message),
    }
}

fn status_badge(status: &str) -> String {
    match status {
        "ok" => "OK".to_string(),
        "warn" => "WARN".to_string(),
        "error" => "ERR".to_string(),
        other => other.to_ascii_uppercase(),
    }
}

pub(crate) fn severity_status(severity: Severity) -> &'static str {
    match severity {
        Severity::Ok => "ok",
        Severity::Warning => "warn",
        Severity::Error => "error",
        Severity::Cancel => "cancel",
    }
}

/// Action label as the control would draw it: bold for a fresh install,
/// italic while an operation is staged.
pub(crate) fn render_button_label(style: OutputStyle, presentation: ButtonPresentation) -> String {
    let label = if presentation.enabled {
        presentation.label.to_string()
    } else {
        format!("{} (unavailable)", presentation.label)
    };
    match (style, presentation.font) {
        (OutputStyle::Plain, _) | (OutputStyle::Rich, FontStyle::Normal) => label,
        (OutputStyle::Rich, FontStyle::Bold) => colorize(Style::new().effects(Effects::BOLD), &label),
        (OutputStyle::Rich, FontStyle::Italic) => {
            colorize(Style::new().effects(Effects::ITALIC), &label)
        }
    }
}

fn menu_labels(controller: &ButtonStateController) -> String {
    controller
        .selectable_states()
        .iter()
        .map(|state| state.label())
        .collect::<Vec<_>>()
        .join(",")
}

pub(crate) fn format_listing_line(
    style: OutputStyle,
    listing: &ListingRef,
    receipt: Option<&InstallReceipt>,
    controller: &ButtonStateController,
) -> String {
    let installed = receipt
        .map(|receipt| receipt.version.as_str())
        .unwrap_or("-");
    let action = render_button_label(style, controller.presentation());
    let menu = menu_labels(controller);
    match style {
        OutputStyle::Plain => format!(
            "{} version={} installed={} action={} enabled={} menu={}",
            listing.id(),
            listing.manifest().version,
            installed,
            controller.presentation().label,
            controller.presentation().enabled,
            if menu.is_empty() { "-" } else { menu.as_str() }
        ),
        OutputStyle::Rich => {
            let mut line = format!(
                "{} {} ({}) [{}]",
                colorize(id_style(), listing.id()),
                listing.manifest().version,
                listing.name(),
                action
            );
            if receipt.is_some() {
                line.push_str(&format!(" installed {installed}"));
            }
            if !menu.is_empty() {
                line.push_str(&format!(" also: {}", menu.replace(',', ", ")));
            }
            line
        }
    }
}

pub(crate) fn format_show_lines(
    style: OutputStyle,
    listing: &ListingRef,
    receipt: Option<&InstallReceipt>,
    controller: &ButtonStateController,
) -> Vec<String> {
    let manifest = listing.manifest();
    let mut lines = vec![
        format!("id: {}", listing.id()),
        format!("name: {}", listing.name()),
        format!("version: {}", manifest.version),
    ];
    if let Some(description) = &manifest.description {
        lines.push(format!("description: {description}"));
    }
    match receipt {
        Some(receipt) => lines.push(format!("installed: {}", receipt.version)),
        None => lines.push("installed: no".to_string()),
    }
    for (dependency, requirement) in &manifest.dependencies {
        lines.push(format!("depends: {dependency} {requirement}"));
    }
    for (conflict, requirement) in &manifest.conflicts {
        lines.push(format!("conflicts: {conflict} {requirement}"));
    }
    for descriptor in manifest.feature_descriptors() {
        let present = receipt
            .map(|receipt| receipt.features.iter().any(|id| id == descriptor.id()))
            .unwrap_or(false);
        lines.push(format!(
            "feature: {} ({}){}",
            descriptor.name(),
            descriptor.id(),
            if present { " installed" } else { "" }
        ));
    }
    lines.push(format!(
        "action: {}",
        render_button_label(style, controller.presentation())
    ));
    let menu = menu_labels(controller);
    if !menu.is_empty() {
        lines.push(format!("menu: {menu}"));
    }
    lines
}

/// The selection tree: one line per listing, one indented line per feature.
pub(crate) fn format_entry_lines(style: OutputStyle, model: &SelectionModel) -> Vec<String> {
    model
        .nodes()
        .into_iter()
        .map(|node| match node {
            SelectionNode::Item(entry) => {
                let label = entry.operation().label();
                let label = match style {
                    OutputStyle::Plain => label.to_string(),
                    OutputStyle::Rich => colorize(id_style(), label),
                };
                format!(
                    "{} {} {}",
                    label,
                    entry.item().id(),
                    entry.item().manifest().version
                )
            }
            SelectionNode::Feature(entry) => format!(
                "  [{}] {} ({})",
                if entry.is_checked() { "x" } else { " " },
                entry.descriptor().name(),
                entry.descriptor().id()
            ),
        })
        .collect()
}

pub(crate) fn format_unavailable_lines(items: &[UnavailableItem]) -> Vec<String> {
    items
        .iter()
        .map(|item| {
            format!(
                "{} ({}): {}",
                item.name.as_deref().unwrap_or(&item.id),
                item.operation.as_str(),
                item.reason.as_str()
            )
        })
        .collect()
}

fn section_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightBlue.into()))
        .effects(Effects::BOLD)
}

fn id_style() -> Style {
    Style::new().fg_color(Some(AnsiColor::BrightCyan.into()))
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}
