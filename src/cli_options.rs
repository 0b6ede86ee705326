use crate::pipeline::RenderOptions;
use std::collections::HashMap;

#[derive(Debug)]
pub enum Command {
    Render {
        scene: String,
        output: String,
        options: RenderOptions,
    },
    RenderText {
        scene: String,
        resolution: u32,
    },
}

pub fn usage() -> &'static str {
    r#"
    render      --scene <file.json> --output <file.png|file.exr>
                [--resolution N] [--samples N] [--seed N]
                [--transparent_background] [--highqualitybvh] [--noparallel]
                [--sampler color|normal|uv|eyelight]
                [--antialiasing random_sampling|super_sampling]
    render_text --scene <file.json> [--resolution N]
    "#
}

/// Parses `render`/`render_text` invocations. The `view` subcommand belongs to the
/// interactive front end and is reported as unsupported here.
pub fn parse_args(args: Vec<String>) -> Result<Command, String> {
    let mut args = args.into_iter().rev().collect::<Vec<_>>();
    args.pop(); // Removes args[0].
    let subcommand = match args.pop() {
        Some(s) => s,
        None => return Err(format!("missing subcommand; usage: {}", usage())),
    };

    let mut pairs: HashMap<String, Option<String>> = HashMap::new();
    while let Some(key) = args.pop() {
        if !key.starts_with('-') {
            return Err(format!("Unrecognized key {}", key));
        }
        match args.last() {
            Some(value) if !value.starts_with('-') => {
                let value = args.pop();
                pairs.insert(key, value);
            }
            _ => {
                pairs.insert(key, None);
            }
        }
    }

    match subcommand.as_str() {
        "render" => parse_render(pairs),
        "render_text" => parse_render_text(pairs),
        "view" => Err("the view subcommand is not supported in this build".to_string()),
        other => Err(format!("unknown subcommand {}; usage: {}", other, usage())),
    }
}

fn required(pairs: &mut HashMap<String, Option<String>>, key: &str) -> Result<String, String> {
    pairs
        .remove(key)
        .flatten()
        .ok_or_else(|| format!("missing required {} <value>", key))
}

fn numeric<T: std::str::FromStr>(
    pairs: &mut HashMap<String, Option<String>>, key: &str, default: T,
) -> Result<T, String> {
    match pairs.remove(key) {
        None => Ok(default),
        Some(None) => Err(format!("{} needs a value", key)),
        Some(Some(v)) => v.parse().map_err(|_| format!("bad value for {}: {}", key, v)),
    }
}

fn flag(pairs: &mut HashMap<String, Option<String>>, key: &str) -> bool {
    pairs.remove(key).is_some()
}

fn reject_leftovers(pairs: HashMap<String, Option<String>>) -> Result<(), String> {
    match pairs.into_iter().next() {
        None => Ok(()),
        Some((k, _)) => Err(format!("Unrecognized key {}", k)),
    }
}

fn parse_render(mut pairs: HashMap<String, Option<String>>) -> Result<Command, String> {
    let scene = required(&mut pairs, "--scene")?;
    let output = required(&mut pairs, "--output")?;
    let defaults = RenderOptions::default();
    let options = RenderOptions {
        width: numeric(&mut pairs, "--resolution", defaults.width)?,
        samples: numeric(&mut pairs, "--samples", defaults.samples)?,
        seed: numeric(&mut pairs, "--seed", defaults.seed)?,
        transparent_background: flag(&mut pairs, "--transparent_background"),
        high_quality_bvh: flag(&mut pairs, "--highqualitybvh"),
        parallel: !flag(&mut pairs, "--noparallel"),
        sampler: match pairs.remove("--sampler") {
            None => defaults.sampler,
            Some(v) => v.ok_or("--sampler needs a value")?.parse()?,
        },
        antialiasing: match pairs.remove("--antialiasing") {
            None => defaults.antialiasing,
            Some(v) => v.ok_or("--antialiasing needs a value")?.parse()?,
        },
    };
    reject_leftovers(pairs)?;
    Ok(Command::Render {
        scene,
        output,
        options,
    })
}

fn parse_render_text(mut pairs: HashMap<String, Option<String>>) -> Result<Command, String> {
    let scene = required(&mut pairs, "--scene")?;
    let resolution = numeric(&mut pairs, "--resolution", crate::pipeline::NOMINAL_WIDTH)?;
    reject_leftovers(pairs)?;
    Ok(Command::RenderText { scene, resolution })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sampler::{Antialiasing, SamplerKind};

    fn args(s: &str) -> Vec<String> {
        std::iter::once("dgram-rt")
            .chain(s.split_whitespace())
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn parses_a_full_render_invocation() {
        let cmd = parse_args(args(
            "render --scene d.json --output out.png --resolution 720 --samples 9 \
             --transparent_background --highqualitybvh --noparallel \
             --sampler eyelight --antialiasing super_sampling",
        ))
        .unwrap();
        match cmd {
            Command::Render {
                scene,
                output,
                options,
            } => {
                assert_eq!(scene, "d.json");
                assert_eq!(output, "out.png");
                assert_eq!(options.width, 720);
                assert_eq!(options.samples, 9);
                assert!(options.transparent_background);
                assert!(options.high_quality_bvh);
                assert!(!options.parallel);
                assert_eq!(options.sampler, SamplerKind::Eyelight);
                assert_eq!(options.antialiasing, Antialiasing::SuperSampling);
            }
            other => panic!("parsed {:?}", other),
        }
    }

    #[test]
    fn defaults_fill_in_missing_flags() {
        match parse_args(args("render --scene d.json --output o.exr")).unwrap() {
            Command::Render { options, .. } => {
                assert_eq!(options.width, 1440);
                assert!(options.parallel);
                assert!(!options.transparent_background);
                assert_eq!(options.sampler, SamplerKind::Color);
            }
            other => panic!("parsed {:?}", other),
        }
    }

    #[test]
    fn rejects_unknown_keys_and_view() {
        assert!(parse_args(args("render --scene a --output b --frobnicate")).is_err());
        assert!(parse_args(args("view --scene a")).is_err());
        assert!(parse_args(args("render --output b")).is_err());
    }

    #[test]
    fn render_text_takes_scene_and_resolution() {
        match parse_args(args("render_text --scene d.json --resolution 2880")).unwrap() {
            Command::RenderText { scene, resolution } => {
                assert_eq!(scene, "d.json");
                assert_eq!(resolution, 2880);
            }
            other => panic!("parsed {:?}", other),
        }
    }
}
