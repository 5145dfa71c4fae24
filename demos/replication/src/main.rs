use log::info;
use vnsim::{
    core::{synthesize, units::Ticks, ImageSpec, Simulation, SynthOpts, Synthesized},
    impls::RandomPass,
};

const SEED: u64 = 0;
const DT: f64 = 1.0;
const T_END: Ticks = Ticks::new(100);

fn main() -> anyhow::Result<()> {
    env_logger::init();

    // The replication scenario: one gateway in front of 16 hosts running 10 overlays
    let opts = SynthOpts::builder()
        .n_switches(4)
        .n_gateways(1)
        .n_hosts(16)
        .images(ImageSpec::from_counts([
            ("database", 12),
            ("long-processing", 50),
            ("short-processing", 200),
        ]))
        .n_overlays(10)
        .build();
    let Synthesized { topology, registry } = synthesize(&opts)?;
    info!(
        "Topology has {} nodes and {} edges ({} entities)",
        topology.nr_nodes(),
        topology.nr_edges(),
        registry.total()
    );

    let agents = RandomPass::builder().seed(SEED).build();
    let mut sim = Simulation::new(&topology, agents.factory());
    sim.run(DT, T_END)?;
    let in_flight = sim.in_flight();
    let stats = sim.into_stats();

    for ((a, b), amount) in stats.edge_totals() {
        let name = |id| topology.node(id).map(|n| n.name()).unwrap_or_default();
        println!("{:>4} <-> {:<4} {:>10.3}", name(a), name(b), amount);
    }
    for (node, amount) in stats.processed_totals() {
        let name = topology.node(node).map(|n| n.name()).unwrap_or_default();
        println!("{:>4} processed {:>10.3}", name, amount);
    }
    println!(
        "generated {:.3}, processed {:.3}, lost {:.3}, undelivered {:.3}, in flight {:.3}",
        stats.generated(),
        stats.total_processed(),
        stats.lost(),
        stats.undelivered(),
        in_flight
    );
    Ok(())
}
