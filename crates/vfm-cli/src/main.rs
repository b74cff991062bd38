use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::OnceLock;

use log::{info, warn};
use vfm_config::VfmDocument;
use vfm_solver::{RunSummary, VfmProblem};

fn usage() {
    eprintln!("usage:");
    eprintln!("  vfm-cli identify <config.xml> [--plot <output.vpl>] [--summary-json <out.json>]");
    eprintln!("  vfm-cli check <config.xml>");
    eprintln!("  vfm-cli --help");
    eprintln!("  vfm-cli --version");
    eprintln!();
    eprintln!("examples:");
    eprintln!("  vfm-cli identify tests/fixtures/uniaxial.xml");
    eprintln!("  vfm-cli identify run.xml --plot run.vpl --summary-json run.json");
    eprintln!("  vfm-cli check run.xml");
}

/// Route Ctrl-C to the cancellation flag of whichever solve is active.
/// Without an active solve the process exits with the conventional 130.
fn install_interrupt_handler() {
    static INSTALLED: OnceLock<()> = OnceLock::new();
    INSTALLED.get_or_init(|| {
        if let Err(err) = ctrlc::set_handler(|| {
            if !vfm_solver::trigger_active() {
                std::process::exit(130);
            }
        }) {
            warn!("could not install interrupt handler: {err}");
        }
    });
}

fn load_document(path: &Path) -> Result<VfmDocument, String> {
    VfmDocument::parse_file(path).map_err(|err| format!("{}: {err}", path.display()))
}

fn check_config(path: &Path) -> Result<(), String> {
    let doc = load_document(path)?;
    let problem = VfmProblem::setup(&doc)?;

    println!("config: {}", path.display());
    println!("nodes: {}", problem.facts().n_nodes());
    println!("elements: {}", problem.facts().n_elems());
    println!("integration_points: {}", problem.facts().total_points());
    println!("time_frames: {}", problem.measured_displacements().len());
    println!("virtual_fields: {}", problem.virtual_fields().len());
    println!("parameters: {}", problem.params().len());
    println!("residual_length: {}", problem.external_work().len());
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("stop_reason: {}", summary.stop_reason);
    println!("iterations: {}", summary.iterations);
    println!(
        "cost: {:.6e} -> {:.6e}",
        summary.initial_cost, summary.final_cost
    );
    println!("residual_evals: {}", summary.n_residual_evals);
    println!("jacobian_evals: {}", summary.n_jacobian_evals);
    for (name, value) in &summary.parameters {
        println!("param {name} = {value:.12e}");
    }
}

fn identify(
    config: &Path,
    plot: Option<&Path>,
    summary_json: Option<&Path>,
) -> Result<(), String> {
    info!(
        "vfm-cli {} starting at {}",
        env!("CARGO_PKG_VERSION"),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );

    let doc = load_document(config)?;
    let mut problem = VfmProblem::setup(&doc)?;

    install_interrupt_handler();
    let summary = problem.run()?;

    let plot_path = plot
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.with_extension("vpl"));
    problem.write_plot(&plot_path)?;
    println!("plot: {}", plot_path.display());

    if let Some(path) = problem.write_virtual_work()? {
        println!("virtual_work: {}", path.display());
    }

    print_summary(&summary);

    if let Some(path) = summary_json {
        let json = serde_json::to_string_pretty(&summary)
            .map_err(|err| format!("failed to serialize summary: {err}"))?;
        std::fs::write(path, json)
            .map_err(|err| format!("failed to write {}: {err}", path.display()))?;
        println!("summary_json: {}", path.display());
    }
    Ok(())
}

/// `identify` argument list: config path plus optional flag pairs.
fn parse_identify_args(args: &[String]) -> Result<(PathBuf, Option<PathBuf>, Option<PathBuf>), String> {
    let mut config = None;
    let mut plot = None;
    let mut summary_json = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--plot" => {
                let value = args
                    .get(i + 1)
                    .ok_or_else(|| "--plot requires a path".to_string())?;
                plot = Some(PathBuf::from(value));
                i += 2;
            }
            "--summary-json" => {
                let value = args
                    .get(i + 1)
                    .ok_or_else(|| "--summary-json requires a path".to_string())?;
                summary_json = Some(PathBuf::from(value));
                i += 2;
            }
            flag if flag.starts_with("--") => {
                return Err(format!("unknown flag {flag}"));
            }
            path => {
                if config.is_some() {
                    return Err(format!("unexpected extra argument '{path}'"));
                }
                config = Some(PathBuf::from(path));
                i += 1;
            }
        }
    }

    let config = config.ok_or_else(|| "missing config path".to_string())?;
    Ok((config, plot, summary_json))
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("help") | Some("-h") | Some("--help") => {
            usage();
            ExitCode::SUCCESS
        }
        Some("--version") | Some("-V") => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        Some("identify") => {
            let (config, plot, summary_json) = match parse_identify_args(&args[2..]) {
                Ok(parsed) => parsed,
                Err(err) => {
                    eprintln!("argument error: {err}");
                    usage();
                    return ExitCode::from(2);
                }
            };
            match identify(&config, plot.as_deref(), summary_json.as_deref()) {
                Ok(()) => ExitCode::SUCCESS,
                Err(err) => {
                    eprintln!("identify error: {err}");
                    ExitCode::from(1)
                }
            }
        }
        Some("check") => {
            if args.len() != 3 {
                usage();
                return ExitCode::from(2);
            }
            match check_config(Path::new(&args[2])) {
                Ok(()) => ExitCode::SUCCESS,
                Err(err) => {
                    eprintln!("check error: {err}");
                    ExitCode::from(1)
                }
            }
        }
        _ => {
            usage();
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    const CONFIG: &str = r#"
<vfm>
  <Mesh>
    <Nodes>
      <node id="1">0,0,0</node>
      <node id="2">1,0,0</node>
      <node id="3">1,1,0</node>
      <node id="4">0,1,0</node>
      <node id="5">0,0,1</node>
      <node id="6">1,0,1</node>
      <node id="7">1,1,1</node>
      <node id="8">0,1,1</node>
    </Nodes>
    <Elements type="hex8" name="block">
      <elem id="1">1,2,3,4,5,6,7,8</elem>
    </Elements>
    <Surface name="xplus">
      <quad4 id="1">2,3,7,6</quad4>
    </Surface>
  </Mesh>
  <Material type="neo-Hookean"><mu>1.0</mu><k>1000.0</k></Material>
  <Parameters>
    <param name="mu">0.7, 0.01, 10.0, 1.0</param>
  </Parameters>
  <MeasuredDisplacements>
    <time t="1.0"></time>
  </MeasuredDisplacements>
  <VirtualDisplacements>
    <field name="stretch-x">
      <time t="1.0">
        <node id="2">1,0,0</node>
        <node id="3">1,0,0</node>
        <node id="6">1,0,0</node>
        <node id="7">1,0,0</node>
      </time>
    </field>
  </VirtualDisplacements>
  <MeasuredLoads>
    <time t="1.0">
      <surface name="xplus">0,0,0</surface>
    </time>
  </MeasuredLoads>
</vfm>
"#;

    fn unique_temp_dir(prefix: &str) -> PathBuf {
        let pid = std::process::id();
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be valid")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("{prefix}_{pid}_{nanos}"));
        fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    #[test]
    fn check_accepts_a_valid_config() {
        let dir = unique_temp_dir("vfm_cli_check");
        let path = dir.join("run.xml");
        fs::write(&path, CONFIG).expect("write config");
        assert!(check_config(&path).is_ok());
    }

    #[test]
    fn check_rejects_a_broken_config() {
        let dir = unique_temp_dir("vfm_cli_check_bad");
        let path = dir.join("run.xml");
        fs::write(&path, CONFIG.replace("xplus\">0,0,0", "ghost\">0,0,0")).expect("write config");
        let err = check_config(&path).expect_err("unknown surface should fail");
        assert!(err.contains("ghost"));
    }

    #[test]
    fn identify_writes_the_plot_artifact() {
        let dir = unique_temp_dir("vfm_cli_identify");
        let config = dir.join("run.xml");
        fs::write(&config, CONFIG).expect("write config");
        let plot = dir.join("out.vpl");

        identify(&config, Some(&plot), None).expect("identity run should succeed");
        let bytes = fs::read(&plot).expect("plot should exist");
        assert_eq!(&bytes[..4], b"VFMP");
    }

    #[test]
    fn identify_writes_the_summary_json() {
        let dir = unique_temp_dir("vfm_cli_summary");
        let config = dir.join("run.xml");
        fs::write(&config, CONFIG).expect("write config");
        let json_path = dir.join("summary.json");

        identify(&config, Some(&dir.join("out.vpl")), Some(&json_path))
            .expect("identity run should succeed");
        let text = fs::read_to_string(&json_path).expect("summary should exist");
        let value: serde_json::Value = serde_json::from_str(&text).expect("valid json");
        assert!(value.get("parameters").is_some());
        assert!(value.get("stop_reason").is_some());
    }

    #[test]
    fn parses_identify_flags() {
        let args: Vec<String> = ["run.xml", "--plot", "a.vpl", "--summary-json", "b.json"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let (config, plot, json) = parse_identify_args(&args).unwrap();
        assert_eq!(config, PathBuf::from("run.xml"));
        assert_eq!(plot, Some(PathBuf::from("a.vpl")));
        assert_eq!(json, Some(PathBuf::from("b.json")));

        assert!(parse_identify_args(&[]).is_err());
        assert!(parse_identify_args(&["--plot".to_string()]).is_err());
    }
}
