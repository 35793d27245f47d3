use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use network_design_kernel::{NetworkPlan, RoutingType, load_network_plan, logger};

#[derive(Parser, Debug)]
#[command(name = "netkernel", version, about = "Inspect and normalize multilayer network plans")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Loads a plan and runs the consistency check.
    Check { file: PathBuf },

    /// Prints per-layer element counts and traffic figures.
    Summary { file: PathBuf },

    /// Loads a plan and writes it back in canonical form.
    Normalize { input: PathBuf, output: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init();

    match cli.command {
        Command::Check { file } => {
            load_network_plan(&file).with_context(|| format!("network plan '{}' is not valid", file.display()))?;
            println!("{}: OK", file.display());
        }
        Command::Summary { file } => {
            let plan = load_network_plan(&file).with_context(|| format!("failed to load '{}'", file.display()))?;
            print_summary(&plan)?;
        }
        Command::Normalize { input, output } => {
            let plan = load_network_plan(&input).with_context(|| format!("failed to load '{}'", input.display()))?;
            plan.save_to_file(&output).with_context(|| format!("failed to write '{}'", output.display()))?;
        }
    }
    Ok(())
}

fn print_summary(plan: &NetworkPlan) -> Result<()> {
    println!("Network '{}': {} nodes, {} resources, {} SRGs", plan.name(), plan.number_of_nodes(), plan.number_of_resources(), plan.srgs().count());

    for layer in plan.layers() {
        let default_marker = if layer.id == plan.default_layer() { " (default)" } else { "" };
        let routing = match layer.routing_type {
            RoutingType::SourceRouting => format!("{} routes, {} protection segments, {} multicast trees", layer.number_of_routes(), layer.number_of_protection_segments(), layer.number_of_multicast_trees()),
            RoutingType::HopByHop => format!("{} forwarding rules", layer.number_of_forwarding_rules()),
        };
        println!("Layer {} '{}'{}: {} links, {} demands, {} multicast demands, {}", layer.id, layer.name, default_marker, layer.number_of_links(), layer.number_of_demands(), layer.number_of_multicast_demands(), routing);

        let mut offered = 0.0;
        let mut blocked = 0.0;
        for demand in layer.demands() {
            offered += demand.offered_traffic;
            blocked += plan.demand_blocked_traffic(demand.id)?;
        }
        println!("  offered {:.3} {}, blocked {:.3} {}", offered, layer.demand_traffic_units, blocked, layer.demand_traffic_units);

        let mut worst_utilization: f64 = 0.0;
        for link in layer.links() {
            worst_utilization = worst_utilization.max(plan.link_utilization(link.id)?);
        }
        println!("  worst link utilization {:.3}", worst_utilization);
    }
    Ok(())
}
