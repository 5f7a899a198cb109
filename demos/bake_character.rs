use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*};

use hychar::customizer::{self, PanelState, SECTIONS};
use hychar::hierarchy::bake_hierarchy;
use hychar::host::{PassthroughEvaluator, UvSplatRenderer};
use hychar::library::spawn_character;
use hychar::lookup::Lookup;
use hychar::scene::ObjectKind;
use hychar::texture_bake::bake_textures;
use hychar::{Config, Scene};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
	#[arg(long, help = "Character library file. Defaults to the bundled resources/CharLibrary.json")]
	library: Option<PathBuf>,
	#[arg(long, help = "Directory baked PNGs are written to")]
	out: Option<PathBuf>,
	#[arg(long, default_value = "NewChar", help = "Prefix of every baked object name")]
	prefix: String,
	#[arg(long, help = "Bake each visible mesh into its own UDIM tile first")]
	textures: bool,
	#[arg(long, help = "Print the customizer parameters of the spawned character")]
	panel: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
	let cli = Cli::parse();

	tracing_subscriber::registry()
		.with(fmt::layer())
		.with(LevelFilter::INFO)
		.init();

	let mut config = Config::default();
	if let Some(library) = cli.library {
		config = config.library_path(library);
	}
	if let Some(out) = cli.out {
		config = config.output_dir(out);
	}

	let mut scene = Scene::new();
	spawn_character(&mut scene, &config)?;
	info!("Spawned character:\n{scene}");

	if cli.panel {
		print_panel(&scene, &config);
	}

	if cli.textures {
		let meshes: Vec<_> = (scene.objects.iter())
			.filter(|(id, object)| object.kind() == ObjectKind::Mesh && scene.is_visible(*id))
			.map(|(id, _)| id)
			.collect();
		let report = bake_textures(&mut scene, &mut UvSplatRenderer, &config, &meshes)?;
		for baked in &report.baked {
			info!("Tile {} -> {}", baked.tile, baked.path.display());
		}
		for failed in &report.failed {
			warn!("{}: {}", failed.object, failed.error);
		}
	}

	let mut evaluator = PassthroughEvaluator::new();
	let baked = bake_hierarchy(&mut scene, &mut evaluator, &config, &cli.prefix)?;
	for skipped in &baked.skipped_modifiers {
		warn!("Kept modifier {:?} on {:?}: {}", skipped.modifier, skipped.object, skipped.reason);
	}
	info!("Baked {} meshes:\n{scene}", baked.meshes.len());
	Ok(())
}

fn print_panel(scene: &Scene, config: &Config) {
	if customizer::panel_state(scene, config) != PanelState::Ready {
		warn!("Character meshes missing, no parameters to show");
		return;
	}
	for section in &SECTIONS {
		println!("{}", section.title);
		for row in customizer::rows(scene, config, section) {
			let group = row.group.map(|group| format!("{group} / ")).unwrap_or_default();
			match row.value {
				Lookup::Found(value) => println!("  {group}{}: {value}", row.label),
				other => println!("  {group}{}: <{other:?}>", row.label),
			}
		}
	}
}
