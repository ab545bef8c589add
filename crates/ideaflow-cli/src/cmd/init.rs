use anyhow::Context;
use ideaflow_core::{config::Config, io, paths, state::State, vcs};
use std::path::Path;

pub fn run(root: &Path) -> anyhow::Result<()> {
    let project_name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string());

    println!("Initializing ideaflow in: {}", root.display());

    for dir in [paths::IDEAFLOW_DIR, paths::SESSIONS_DIR] {
        let p = root.join(dir);
        io::ensure_dir(&p).with_context(|| format!("failed to create {}", p.display()))?;
    }

    let config_path = paths::config_path(root);
    let config = if !config_path.exists() {
        let cfg = Config::new(&project_name);
        cfg.save(root).context("failed to write config.yaml")?;
        println!("  created: {}", paths::CONFIG_FILE);
        cfg
    } else {
        println!("  exists:  {}", paths::CONFIG_FILE);
        Config::load(root).context("failed to load config")?
    };

    if !paths::state_path(root).exists() {
        State::default().save(root).context("failed to write state.yaml")?;
        println!("  created: {}", paths::STATE_FILE);
    } else {
        println!("  exists:  {}", paths::STATE_FILE);
    }

    let versioner = vcs::open(root, config.versioning.enabled);
    if versioner.is_enabled() {
        versioner
            .init()
            .context("failed to initialize document history")?;
        println!("  history: git repository in {}", paths::IDEAFLOW_DIR);
    } else {
        println!("  history: disabled");
    }

    println!("\nNext: ideaflow start --idea \"<your idea>\"");
    Ok(())
}
