//! 三路由器三 LAN 实验
//!
//! 构建拓扑、安装静态路由、打印内核命令，然后跑一遍 ping 和 traceroute。

use clap::Parser;
use l3lab::net::NodeId;
use l3lab::probe::{DEFAULT_MAX_HOPS, EmulatedLab, Prober};
use l3lab::route::{CommandStyle, RouteScope, StaticRouteInstaller, node_commands};
use l3lab::topo::{LabSpec, build_lan_chain};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "three-lan", about = "三路由器三 LAN 静态路由实验")]
struct Args {
    /// 实验配置 JSON，缺省使用内置的 A/B/C 实验
    #[arg(long)]
    spec: Option<PathBuf>,

    /// 路由范围：full 或 backbone-only（覆盖配置文件中的值）
    #[arg(long)]
    scope: Option<RouteScope>,

    /// 路由命令风格：net-tools 或 iproute2
    #[arg(long, default_value_t = CommandStyle::NetTools)]
    commands: CommandStyle,

    /// 把拓扑和路由导出为 JSON
    #[arg(long)]
    plan_json: Option<PathBuf>,

    /// 只安装路由，不做连通性测试
    #[arg(long)]
    no_probes: bool,

    #[arg(long, default_value = "hA1")]
    trace_from: String,

    #[arg(long, default_value = "hC1")]
    trace_to: String,
}

fn main() {
    // 初始化 tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    let args = Args::parse();
    if let Err(e) = run(&args) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> l3lab::Result<()> {
    let spec = match &args.spec {
        Some(path) => LabSpec::load(path)?,
        None => LabSpec::default(),
    };
    let scope = args.scope.unwrap_or(spec.scope);

    let mut chain = build_lan_chain(&spec)?;
    StaticRouteInstaller::new(scope).install(&mut chain.topo)?;

    println!("===== Static Routes ({scope}) =====");
    for node in chain.topo.nodes() {
        let cmds = node_commands(node, args.commands);
        if cmds.is_empty() {
            continue;
        }
        println!("[{}]", node.name());
        for cmd in cmds {
            println!("  {cmd}");
        }
    }

    if let Some(path) = &args.plan_json {
        let json = serde_json::to_string_pretty(&chain.topo.plan())?;
        fs::write(path, json)?;
        eprintln!("wrote lab plan to {}", path.display());
    }

    if args.no_probes {
        return Ok(());
    }

    let mut lab = EmulatedLab::start(chain.topo);

    println!("===== Testing Intra-LAN Connectivity =====");
    for lan in &chain.lans {
        let mut members: Vec<NodeId> = vec![lan.router];
        members.extend(&lan.hosts);
        println!("--- LAN {} ({}) ---", lan.name, lan.subnet);
        println!("{}", lab.ping_mesh(&members));
    }

    println!("===== Testing Inter-LAN Connectivity =====");
    println!("{}", lab.ping_all());

    let topo = lab.topology();
    let from = topo.node_by_name(&args.trace_from);
    let to = topo
        .node_by_name(&args.trace_to)
        .and_then(|n| topo.primary_addr(n));
    match (from, to) {
        (Some(from), Some(to)) => {
            println!("===== Traceroute {} -> {} =====", args.trace_from, args.trace_to);
            print!("{}", lab.traceroute(from, to, DEFAULT_MAX_HOPS));
        }
        _ => eprintln!(
            "skipping traceroute: unknown node {} or {}",
            args.trace_from, args.trace_to
        ),
    }

    lab.shutdown();
    Ok(())
}
