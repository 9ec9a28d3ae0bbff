use anyhow::{Context, Result};
use clap::Parser;
use rankchart::config::{DashboardConfig, PRESET_NAMES};
use rankchart::export;
use rankchart::graph;
use rankchart::ir::{ChartKind, DashboardView};
use rankchart::palette::HighlightMode;
use rankchart::parser::parse_assignment_arg;
use rankchart::runtime::{self, PageOutcome, PageRequest, Session};
use rankchart::transform::{SortOrder, Statistic};
use rankchart::OutputFormat;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Exit status when the data or configuration has to be fixed
const EXIT_BLOCKED: i32 = 2;

#[derive(Parser, Debug)]
#[command(name = "rankchart")]
#[command(about = "Rank groups of a CSV file by a statistic and chart them", long_about = None)]
struct Args {
    /// Input CSV, spreadsheet (.xlsx, .xls) or .json array of objects
    input: PathBuf,

    /// Built-in page configuration (prices, subway, population, mbti)
    #[arg(long, conflicts_with = "config")]
    preset: Option<String>,

    /// JSON dashboard configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Category choice, e.g. --select product=apple (repeatable)
    #[arg(long = "select", value_name = "ROLE=VALUE", value_parser = parse_assignment_arg)]
    selection: Vec<(String, String)>,

    /// Bind a role to a column by hand, e.g. --column price=가격 (repeatable)
    #[arg(long = "column", value_name = "ROLE=COLUMN", value_parser = parse_assignment_arg)]
    overrides: Vec<(String, String)>,

    /// mean, median, min, max, sum or count
    #[arg(long)]
    statistic: Option<Statistic>,

    /// ascending or descending
    #[arg(long)]
    order: Option<SortOrder>,

    /// max, min or both
    #[arg(long)]
    highlight: Option<HighlightMode>,

    /// Keep only the first N groups after sorting
    #[arg(long)]
    top_n: Option<usize>,

    /// bar or line
    #[arg(long)]
    chart: Option<ChartKind>,

    /// Print the distinct values of a category role and exit
    #[arg(long, value_name = "ROLE")]
    list: Option<String>,

    /// Write the chart here (.png or .svg)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write the aggregated table here as CSV
    #[arg(long)]
    export: Option<PathBuf>,

    /// Prefix the exported CSV with a UTF-8 byte-order mark
    #[arg(long, requires = "export")]
    bom: bool,

    /// Print the view as JSON instead of a text table
    #[arg(long)]
    json: bool,
}

fn load_config(args: &Args) -> Result<DashboardConfig> {
    let mut config = match (&args.config, &args.preset) {
        (Some(path), _) => DashboardConfig::from_json_file(path)?,
        (None, Some(name)) => DashboardConfig::preset(name).with_context(|| {
            format!("Unknown preset '{}' (available: {})", name, PRESET_NAMES.join(", "))
        })?,
        (None, None) => anyhow::bail!("Either --preset or --config is required"),
    };

    // Flags override the configuration
    if let Some(statistic) = args.statistic {
        config.statistic = statistic;
    }
    if let Some(order) = args.order {
        config.order = order;
    }
    if let Some(highlight) = args.highlight {
        config.highlight = highlight;
    }
    if args.top_n.is_some() {
        config.top_n = args.top_n;
    }
    if let Some(chart) = args.chart {
        config.chart = chart;
    }
    config.validate()?;
    Ok(config)
}

/// Marker for the row at `idx`; the extremes sit at the ends of the sorted table
fn marker(view: &DashboardView, idx: usize) -> &'static str {
    let last = view.table.len().saturating_sub(1);
    let (max_idx, min_idx) = match view.table.order {
        SortOrder::Descending => (0, last),
        SortOrder::Ascending => (last, 0),
    };
    match view.highlight {
        HighlightMode::HighlightMax if idx == max_idx => " (max)",
        HighlightMode::HighlightMin if idx == min_idx => " (min)",
        HighlightMode::HighlightBoth if idx == max_idx => " (max)",
        HighlightMode::HighlightBoth if idx == min_idx => " (min)",
        _ => "",
    }
}

fn print_summary(view: &DashboardView, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "{}", view.title)?;
    writeln!(out, "{}: {}", view.x_label, view.y_label)?;
    for (rank, (row, color)) in view.table.rows.iter().zip(&view.colors).enumerate() {
        writeln!(
            out,
            "{:>3}. {}\t{}\tn={}\t{}{}",
            rank + 1,
            row.label(),
            row.value,
            row.count,
            color,
            marker(view, rank)
        )?;
    }
    if view.total_groups > view.table.len() {
        writeln!(out, "({} of {} groups shown)", view.table.len(), view.total_groups)?;
    }
    if view.dropped_rows > 0 {
        writeln!(out, "({} rows skipped: non-numeric values)", view.dropped_rows)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(EXIT_BLOCKED);
        }
    };
    let render_options = config.render.clone();
    let mut session = Session::new(config, args.input.clone());

    let stdout = io::stdout();
    let mut handle = stdout.lock();

    // Dropdown contents
    if let Some(role) = &args.list {
        match session.options(role, &args.overrides) {
            Ok(values) => {
                for value in values {
                    writeln!(handle, "{}", value).context("Failed to write to stdout")?;
                }
                return Ok(());
            }
            Err(err) => {
                let message = match runtime::outcome_for_error(&err) {
                    PageOutcome::Warning(m) | PageOutcome::Blocked(m) => m,
                    PageOutcome::Rendered(_) => err.to_string(),
                };
                eprintln!("Error: {}", message);
                std::process::exit(EXIT_BLOCKED);
            }
        }
    }

    let request = PageRequest {
        selection: args.selection.clone(),
        overrides: args.overrides.clone(),
    };
    let view = match runtime::run_page(&mut session, &request) {
        PageOutcome::Rendered(view) => view,
        PageOutcome::Warning(message) => {
            eprintln!("Warning: {}", message);
            return Ok(());
        }
        PageOutcome::Blocked(message) => {
            eprintln!("Error: {}", message);
            std::process::exit(EXIT_BLOCKED);
        }
    };

    if args.json {
        serde_json::to_writer_pretty(&mut handle, view.as_ref())
            .context("Failed to write JSON to stdout")?;
        writeln!(handle).context("Failed to write to stdout")?;
    } else {
        print_summary(&view, &mut handle).context("Failed to write summary to stdout")?;
    }
    handle.flush().context("Failed to flush stdout")?;

    if let Some(path) = &args.export {
        export::write_table_csv(&view.table, path, args.bom)?;
        info!(path = %path.display(), bom = args.bom, "exported aggregated table");
    }

    if let Some(path) = &args.output {
        let mut options = render_options;
        if let Some(format) = OutputFormat::from_path(path) {
            options.format = format;
        }
        let bytes = graph::render_chart(&view, &options).context("Failed to render chart")?;
        std::fs::write(path, bytes)
            .with_context(|| format!("Failed to write chart to {}", path.display()))?;
        info!(path = %path.display(), "wrote chart");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rankchart::data::Dataset;
    use rankchart::resolve::{RoleKind, RoleSpec};
    use rankchart::runtime::build_view;

    /// Two different group keys that join to the same label
    fn colliding_view(highlight: HighlightMode, order: SortOrder) -> DashboardView {
        let mut config = DashboardConfig::preset("prices").unwrap();
        config.highlight = highlight;
        config.order = order;
        config.roles.push(RoleSpec::new("ward", RoleKind::Group, &["ward"]));
        let data = Dataset::new(
            vec!["product".into(), "region".into(), "ward".into(), "price".into()],
            vec![
                vec!["a".into(), "A / B".into(), "C".into(), "5".into()],
                vec!["a".into(), "A".into(), "B / C".into(), "1".into()],
                vec!["a".into(), "M".into(), "N".into(), "3".into()],
            ],
        )
        .unwrap();
        build_view(&config, &data, &Default::default()).unwrap()
    }

    fn markers(view: &DashboardView) -> Vec<&'static str> {
        (0..view.table.len()).map(|idx| marker(view, idx)).collect()
    }

    #[test]
    fn test_markers_follow_row_position() {
        let view = colliding_view(HighlightMode::HighlightBoth, SortOrder::Descending);
        assert_eq!(view.table.rows[0].label(), view.table.rows[2].label());
        assert_eq!(markers(&view), vec![" (max)", "", " (min)"]);

        let view = colliding_view(HighlightMode::HighlightMin, SortOrder::Ascending);
        assert_eq!(markers(&view), vec![" (min)", "", ""]);

        let view = colliding_view(HighlightMode::HighlightMax, SortOrder::Ascending);
        assert_eq!(markers(&view), vec!["", "", " (max)"]);
    }

    #[test]
    fn test_single_row_marked_max_when_both() {
        let mut view = colliding_view(HighlightMode::HighlightBoth, SortOrder::Descending);
        view.table.rows.truncate(1);
        assert_eq!(markers(&view), vec![" (max)"]);
    }
}
