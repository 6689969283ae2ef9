mod event_log;

use std::{fs, path::PathBuf, rc::Rc};

use anyhow::{bail, Context, Result};
use clap::Parser;
use core_markups::{Displayable, MarkupsNode, NodeId, SceneContext};
use glam::{DAffine3, DVec3};
use settings::{MarkupsSettings, SettingsStore};

/// Loads or seeds a markups list and prints a report of it
#[derive(Parser, Debug, PartialEq)]
#[command(author, version, about, long_about = None)]
struct ShellArgs {
    /// saved list (JSON) to load instead of the demo list
    snapshot: Option<PathBuf>,

    /// settings file to use instead of the per-user one
    #[arg(long)]
    settings: Option<PathBuf>,

    /// place the list in the scene at this offset, given as `X,Y,Z`
    #[arg(
        long,
        value_name = "X,Y,Z",
        value_parser = parse_vector,
        allow_hyphen_values = true
    )]
    translate: Option<DVec3>,

    /// write the list to this file after loading
    #[arg(long)]
    save: Option<PathBuf>,
}

fn parse_vector(text: &str) -> Result<DVec3> {
    let values = text
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("invalid vector `{text}`"))?;
    match values.as_slice() {
        [x, y, z] => Ok(DVec3::new(*x, *y, *z)),
        _ => bail!("vector `{text}` needs exactly three components"),
    }
}

/// Scene holding a single fixed placement for the shell's node.
struct ShellScene {
    placement: Option<DAffine3>,
}

impl SceneContext for ShellScene {
    fn local_to_world(&self, _node: NodeId) -> Option<DAffine3> {
        self.placement
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = ShellArgs::parse();

    let settings_store = match &args.settings {
        Some(path) => SettingsStore::at_path(path),
        None => SettingsStore::new().context("settings store init failed")?,
    };
    let settings = match settings_store.load() {
        Ok(settings) => settings,
        Err(err) => {
            event_log::warn(format!("Using default settings (failed to load): {err}"));
            MarkupsSettings::default()
        }
    };

    let mut node = MarkupsNode::from_settings("F", &settings);
    node.set_scene(Some(Rc::new(ShellScene {
        placement: args.translate.map(DAffine3::from_translation),
    })));
    node.add_observer(|_, event| event_log::record_event(event));

    match &args.snapshot {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            node.load_json(&text)
                .with_context(|| format!("failed to load {}", path.display()))?;
            node.mark_read_written();
            event_log::info(format!(
                "Loaded `{}` with {} control points from {}",
                node.name(),
                node.number_of_control_points(),
                path.display()
            ));
        }
        None => seed_demo(&mut node)?,
    }

    report(&node);

    if let Some(path) = &args.save {
        fs::write(path, node.to_json()?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        node.mark_read_written();
        event_log::info(format!("Saved `{}` to {}", node.name(), path.display()));
    }

    let entries = event_log::entries();
    println!(
        "{} log entries, {} from `{}`",
        entries.len(),
        event_log::node_events(node.id()).len(),
        node.name()
    );
    for entry in entries
        .iter()
        .filter(|entry| entry.level == event_log::LogLevel::Warn)
    {
        println!("  {} [{}] {}", entry.timestamp_secs, entry.level, entry.message);
    }
    Ok(())
}

fn seed_demo(node: &mut MarkupsNode) -> Result<()> {
    for position in [
        DVec3::new(0.0, 0.0, 0.0),
        DVec3::new(40.0, 0.0, 0.0),
        DVec3::new(40.0, 30.0, 0.0),
        DVec3::new(0.0, 30.0, 10.0),
    ] {
        node.add_control_point_at(position, None)?;
    }
    node.set_nth_control_point_description(3, "raised corner")?;
    event_log::info(format!(
        "Seeded demo list `{}` with {} control points",
        node.name(),
        node.number_of_control_points()
    ));
    Ok(())
}

fn report(node: &MarkupsNode) {
    println!(
        "{} ({}): {} control points, {} curve, {}",
        node.name(),
        node.id(),
        node.number_of_control_points(),
        node.curve_kind().label(),
        if node.curve_closed() { "closed" } else { "open" }
    );
    for (index, point) in node.control_points().iter().enumerate() {
        let world = node.nth_control_point_position_world(index);
        println!(
            "  [{index}] id={} label={} world=({:.2}, {:.2}, {:.2}){}",
            point.id,
            point.label,
            world.x,
            world.y,
            world.z,
            if node.nth_control_point_locked(index) { " locked" } else { "" }
        );
    }

    let center = node.center_position_world();
    println!("  center=({:.2}, {:.2}, {:.2})", center.x, center.y, center.z);
    if let Some(bounds) = node.bounds_world() {
        println!("  bounds={:?}", bounds.to_array());
    }

    match node.try_curve_poly() {
        Ok(local) => {
            let curve = node.curve_poly_world();
            println!(
                "  curve: {} samples, length {:.3}",
                curve.len(),
                curve.length()
            );
            let middle = local.len() / 2;
            if let Some(index) = node.control_point_index_for_curve_index(middle) {
                println!("  sample {middle} lies after control point {index}");
            }
        }
        Err(err) => println!("  no curve: {err}"),
    }

    let display = node.create_default_display();
    println!(
        "  display: glyph scale {}, line thickness {}",
        display.glyph_scale, display.line_thickness
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<ShellArgs, clap::Error> {
        ShellArgs::try_parse_from(std::iter::once("markups_shell").chain(list.iter().copied()))
    }

    #[test]
    fn parses_all_options() {
        let parsed = args(&["list.json", "--translate", "1, 2,3", "--save", "out.json"]).unwrap();
        assert_eq!(parsed.snapshot, Some(PathBuf::from("list.json")));
        assert_eq!(parsed.translate, Some(DVec3::new(1.0, 2.0, 3.0)));
        assert_eq!(parsed.save, Some(PathBuf::from("out.json")));
        assert_eq!(parsed.settings, None);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(args(&["--translate", "1,2"]).is_err());
        assert!(args(&["--save"]).is_err());
        assert!(args(&["--verbose"]).is_err());
        assert!(args(&["a.json", "b.json"]).is_err());
    }

    #[test]
    fn negative_offsets_are_values() {
        let parsed = args(&["--translate", "-1,0,-2.5"]).unwrap();
        assert_eq!(parsed.translate, Some(DVec3::new(-1.0, 0.0, -2.5)));
    }

    #[test]
    fn no_arguments_seed_the_demo() {
        let parsed = args(&[]).unwrap();
        assert_eq!(parsed.snapshot, None);
        assert_eq!(parsed.translate, None);
    }
}
