#[cfg(target_arch = "wasm32")]
fn main() {
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    if let Err(err) = native::run() {
        eprintln!("zone_cli error: {err}");
        std::process::exit(1);
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::fs;
    use std::path::Path;

    use sticker_engine::annotate::validate::validate;
    use sticker_engine::annotate::{MarkerRecord, SceneDiff, ZoneDocument, ZoneStatus, ZoneStore, zone_document_name};
    use sticker_engine::config::EngineConfig;

    const USAGE: &str = r#"zone_cli (sticker-engine)

USAGE:
  zone_cli name <model>
  zone_cli check <zones.json>
  zone_cli grade <zones.json> <markers.json> [options]

COMMANDS:
  name     Print the zone document name looked up when <model> is loaded
  check    Validate a zone document and list its zones
  grade    Grade local-space markers `[{"symbol": "A", "position": [x, y, z]}]`
           against a zone document

OPTIONS (grade):
  --scale <s>        Uniform scale of the target (default 1)
  --config <path>    Engine config JSON (partial objects allowed)
  -h, --help         Show this help
"#;

    pub fn run() -> Result<(), String> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let mut args = Args::new(args);

        let Some(command) = args.next() else {
            print_usage();
            return Ok(());
        };

        match command.as_str() {
            "name" => {
                let model = args.next().ok_or("missing model name")?;
                println!("{}", zone_document_name(&model).map_err(|err| err.to_string())?);
                Ok(())
            }
            "check" => cmd_check(&mut args),
            "grade" => cmd_grade(&mut args),
            "-h" | "--help" | "help" => {
                print_usage();
                Ok(())
            }
            other => Err(format!("unknown command `{other}`\n\n{USAGE}")),
        }
    }

    fn print_usage() {
        println!("{USAGE}");
    }

    fn read_text(path: &Path) -> Result<String, String> {
        fs::read_to_string(path).map_err(|err| format!("failed to read {}: {err}", path.display()))
    }

    fn load_document(path: &Path) -> Result<ZoneDocument, String> {
        ZoneDocument::from_json(&read_text(path)?).map_err(|err| format!("{}: {err}", path.display()))
    }

    fn cmd_check(args: &mut Args) -> Result<(), String> {
        let path = args.next().ok_or("missing zone document path")?;
        let doc = load_document(Path::new(&path))?;

        let model = if doc.model_name.is_empty() { "<unnamed>" } else { &doc.model_name };
        println!("model:     {model}");
        if !doc.timestamp.is_empty() {
            println!("timestamp: {}", doc.timestamp);
        }
        println!("zones:     {}", doc.zones.len());
        for (i, zone) in doc.zones.iter().enumerate() {
            let p = zone.position;
            let n = zone.normal;
            println!(
                "  #{:<3} '{}' at ({:.4}, {:.4}, {:.4}) normal ({:.3}, {:.3}, {:.3})",
                i + 1,
                zone.expected_symbol,
                p.x,
                p.y,
                p.z,
                n.x,
                n.y,
                n.z
            );
        }
        Ok(())
    }

    fn cmd_grade(args: &mut Args) -> Result<(), String> {
        let zones_path = args.next().ok_or("missing zone document path")?;
        let markers_path = args.next().ok_or("missing marker list path")?;

        let mut scale = 1.0;
        let mut config = EngineConfig::default();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--scale" => {
                    let value = args.value("--scale")?;
                    scale = value
                        .parse::<f64>()
                        .ok()
                        .filter(|s| s.is_finite() && *s > 0.0)
                        .ok_or_else(|| format!("invalid --scale `{value}`"))?;
                }
                "--config" => {
                    let path = args.value("--config")?;
                    config = EngineConfig::from_json(&read_text(Path::new(&path))?).map_err(|err| err.to_string())?;
                }
                "-h" | "--help" => {
                    print_usage();
                    return Ok(());
                }
                other => return Err(format!("unknown option `{other}`")),
            }
        }

        let doc = load_document(Path::new(&zones_path))?;
        let markers: Vec<MarkerRecord> = serde_json::from_str(&read_text(Path::new(&markers_path))?)
            .map_err(|err| format!("{markers_path}: {err}"))?;

        let mut zones = ZoneStore::new();
        zones
            .replace_all(&doc.zones, &mut SceneDiff::new())
            .map_err(|err| format!("{zones_path}: {err}"))?;
        let threshold = config.match_threshold(scale);
        let result = validate(&mut zones, &markers, threshold);

        for (i, verdict) in result.verdicts.iter().enumerate() {
            let label = match verdict.status {
                ZoneStatus::Correct => "correct",
                ZoneStatus::WrongSymbol => "wrong symbol",
                ZoneStatus::Missing if verdict.distance.is_some() => "too far",
                ZoneStatus::Missing | ZoneStatus::Unset => "missing",
            };
            let distance = verdict
                .distance
                .map_or_else(|| "n/a".to_string(), |d| format!("{d:.3}"));
            println!("zone #{:<3} '{}': {label:<12} [distance {distance}]", i + 1, verdict.expected_symbol);
        }
        println!(
            "{}/{} correct (threshold {threshold:.4}){}",
            result.report.correct,
            result.report.total,
            if result.report.is_perfect { ", perfect" } else { "" }
        );
        Ok(())
    }

    struct Args {
        args: Vec<String>,
        pos: usize,
    }

    impl Args {
        fn new(args: Vec<String>) -> Self {
            Self { args, pos: 0 }
        }

        fn next(&mut self) -> Option<String> {
            let arg = self.args.get(self.pos)?.clone();
            self.pos += 1;
            Some(arg)
        }

        fn value(&mut self, flag: &str) -> Result<String, String> {
            self.next().ok_or_else(|| format!("missing value for {flag}"))
        }
    }
}
