use anyhow::{anyhow, bail, Context};
use render_parity::{
    CaseReport, Channel, ChannelPaths, ComparisonReport, Document, FramePair, Orchestrator,
    OracleConfig, RenderOutputSet,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

const USAGE: &str = "\
usage:
  render_compare images <candidate_dir> <reference_dir> [--frames N] [--config FILE] [--report FILE]
  render_compare gltf <candidate.gltf> <reference.gltf> [--channel color|depth|label] [--config FILE] [--report FILE]
  render_compare gltf <export_dir> <truth_dir> [--config FILE] [--report FILE]";

#[derive(Debug, Default)]
struct Options {
    positional: Vec<String>,
    frames: Option<usize>,
    channel: Option<Channel>,
    config: Option<PathBuf>,
    report: Option<PathBuf>,
}

fn parse_options(args: impl Iterator<Item = String>) -> anyhow::Result<Options> {
    let mut opts = Options::default();
    let mut args = args;
    while let Some(arg) = args.next() {
        let mut value = |flag: &str| args.next().ok_or_else(|| anyhow!("{flag} needs a value"));
        match arg.as_str() {
            "--frames" => opts.frames = Some(value("--frames")?.parse().context("--frames")?),
            "--channel" => opts.channel = Some(parse_channel(&value("--channel")?)?),
            "--config" => opts.config = Some(value("--config")?.into()),
            "--report" => opts.report = Some(value("--report")?.into()),
            flag if flag.starts_with("--") => bail!("unknown option {flag}"),
            other => opts.positional.push(other.to_string()),
        }
    }
    Ok(opts)
}

fn parse_channel(name: &str) -> anyhow::Result<Channel> {
    Channel::ALL
        .into_iter()
        .find(|c| c.as_str() == name)
        .ok_or_else(|| anyhow!("unknown channel '{name}'"))
}

/// Image names written by the render client's demo for frame `index`.
fn frame_images(dir: &Path, index: usize) -> ChannelPaths {
    ChannelPaths {
        color: dir.join(format!("color_{index:03}.png")),
        depth: dir.join(format!("depth_{index:03}.tiff")),
        label: dir.join(format!("label_{index:03}.png")),
    }
}

/// Scene exports the render client writes for each channel, and the checked-in
/// ground truth they are compared against.
fn channel_documents(export_dir: &Path, truth_dir: &Path) -> (ChannelPaths, ChannelPaths) {
    let export = |index: usize, channel: Channel| {
        export_dir.join(format!("{:019}-{channel}.gltf", index + 1))
    };
    let truth = |channel: Channel| truth_dir.join(format!("test_{channel}_scene.gltf"));
    (
        ChannelPaths {
            color: export(0, Channel::Color),
            depth: export(1, Channel::Depth),
            label: export(2, Channel::Label),
        },
        ChannelPaths {
            color: truth(Channel::Color),
            depth: truth(Channel::Depth),
            label: truth(Channel::Label),
        },
    )
}

fn compare_images(
    orchestrator: &Orchestrator,
    opts: &Options,
) -> anyhow::Result<ComparisonReport> {
    let [candidate_dir, reference_dir] = opts.positional.as_slice() else {
        bail!("images needs <candidate_dir> <reference_dir>\n{USAGE}");
    };
    let pairs: Vec<FramePair<RenderOutputSet>> = (0..opts.frames.unwrap_or(2))
        .map(|frame| FramePair {
            frame,
            candidate: RenderOutputSet {
                images: frame_images(Path::new(candidate_dir), frame),
                documents: None,
            },
            reference: RenderOutputSet {
                images: frame_images(Path::new(reference_dir), frame),
                documents: None,
            },
        })
        .collect();
    Ok(orchestrator.compare_images(&pairs))
}

fn compare_gltf(
    orchestrator: &Orchestrator,
    opts: &Options,
) -> anyhow::Result<ComparisonReport> {
    let [candidate, reference] = opts.positional.as_slice() else {
        bail!("gltf needs <candidate.gltf> <reference.gltf>\n{USAGE}");
    };
    if Path::new(candidate).is_dir() && Path::new(reference).is_dir() {
        let (exports, truths) = channel_documents(Path::new(candidate), Path::new(reference));
        // document mode never opens the image paths
        let pair = FramePair {
            frame: 0,
            candidate: RenderOutputSet {
                images: exports.clone(),
                documents: Some(exports),
            },
            reference: RenderOutputSet {
                images: truths.clone(),
                documents: Some(truths),
            },
        };
        return Ok(orchestrator.compare_documents(&[pair]));
    }

    let channel = opts.channel.unwrap_or(Channel::Color);
    let case = match (Document::load(candidate), Document::load(reference)) {
        (Ok(actual), Ok(expected)) => {
            orchestrator.compare_document_pair(0, channel, &actual, &expected)
        }
        (Err(e), _) | (_, Err(e)) => CaseReport::from_structure(0, channel, Err(e)),
    };
    Ok(ComparisonReport { cases: vec![case] })
}

fn run() -> anyhow::Result<ExitCode> {
    let mut args = std::env::args().skip(1);
    let Some(command) = args.next() else {
        println!("{USAGE}");
        return Ok(ExitCode::from(2));
    };
    let opts = parse_options(args)?;

    let config = match &opts.config {
        Some(path) => OracleConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => OracleConfig::default(),
    };
    let orchestrator = Orchestrator::new(config);

    let report = match command.as_str() {
        "images" => compare_images(&orchestrator, &opts)?,
        "gltf" => compare_gltf(&orchestrator, &opts)?,
        other => bail!("unknown command '{other}'\n{USAGE}"),
    };

    println!("{report}");
    if let Some(path) = &opts.report {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).ok();
        }
        fs::write(path, report.to_json_pretty()?)
            .with_context(|| format!("writing report {}", path.display()))?;
        println!("report written to {}", path.display());
    }

    Ok(ExitCode::from(exit_status(&report)))
}

/// 0 when every case passed, 1 on a threshold failure, 2 when any case was
/// fatal.
fn exit_status(report: &ComparisonReport) -> u8 {
    if report.has_fatal() {
        2
    } else if report.passed() {
        0
    } else {
        1
    }
}

fn main() -> ExitCode {
    env_logger::init();
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("render_compare: {e:#}");
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use render_parity::{CaseKind, CaseOutcome, ErrorKind};

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn options_split_flags_and_positionals() {
        let opts = parse_options(args(&["a", "--frames", "3", "b", "--channel", "label"]))
            .expect("parse");
        assert_eq!(opts.positional, vec!["a", "b"]);
        assert_eq!(opts.frames, Some(3));
        assert_eq!(opts.channel, Some(Channel::Label));
    }

    #[test]
    fn options_reject_unknown_flags() {
        assert!(parse_options(args(&["--fast"])).is_err());
        assert!(parse_options(args(&["--frames"])).is_err());
    }

    fn case(frame: usize, outcome: CaseOutcome) -> CaseReport {
        CaseReport {
            frame,
            kind: CaseKind::Image,
            channel: Channel::Color,
            outcome,
            detail: None,
        }
    }

    fn fatal() -> CaseOutcome {
        CaseOutcome::Fatal {
            kind: ErrorKind::Io,
            message: "missing".into(),
        }
    }

    #[test]
    fn exit_status_follows_worst_case() {
        let passed = ComparisonReport {
            cases: vec![case(0, CaseOutcome::Passed), case(1, CaseOutcome::Passed)],
        };
        assert_eq!(exit_status(&passed), 0);

        let exceeded = ComparisonReport {
            cases: vec![case(0, CaseOutcome::Passed), case(1, CaseOutcome::ThresholdExceeded)],
        };
        assert_eq!(exit_status(&exceeded), 1);

        let broken = ComparisonReport {
            cases: vec![case(0, fatal())],
        };
        assert_eq!(exit_status(&broken), 2);

        let mixed = ComparisonReport {
            cases: vec![case(0, CaseOutcome::ThresholdExceeded), case(1, fatal())],
        };
        assert_eq!(exit_status(&mixed), 2);

        assert_eq!(exit_status(&ComparisonReport::default()), 0);
    }

    #[test]
    fn channel_documents_pair_exports_with_ground_truth() {
        let (exports, truths) = channel_documents(Path::new("out"), Path::new("truth"));
        assert_eq!(exports.color, Path::new("out/0000000000000000001-color.gltf"));
        assert_eq!(exports.label, Path::new("out/0000000000000000003-label.gltf"));
        assert_eq!(truths.depth, Path::new("truth/test_depth_scene.gltf"));
    }

    #[test]
    fn frame_images_follow_demo_naming() {
        let paths = frame_images(Path::new("out"), 1);
        assert_eq!(paths.depth, Path::new("out/depth_001.tiff"));
    }
}
