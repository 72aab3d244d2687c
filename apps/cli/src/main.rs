use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Local};
use clap::{Args, Parser, Subcommand};
use sessionmgr_session::{FileProps, SessionIndex, SessionManager};
use sessionmgr_settings::{SettingKey, SettingValue};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// 設定資料夾名稱。 / Name of the configuration folder inside the workspace.
const CONFIG_DIR: &str = ".sessionmgr";

#[derive(Parser)]
#[command(
    name = "sessionmgr",
    about = "Manage editor sessions and the global file property store",
    author,
    version
)]
struct Cli {
    /// 指定工作區根目錄；預設為目前目錄。 / Workspace root (defaults to current directory).
    #[arg(long, global = true, value_name = "PATH")]
    workspace: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 列出工作階段。 / List sessions with their roles.
    List(ListArgs),
    /// 建立空白工作階段。 / Create an empty session.
    New {
        name: String,
    },
    /// 複製工作階段。 / Copy a session under a new name.
    Copy {
        from: String,
        name: String,
    },
    /// 重新命名工作階段。 / Rename a session.
    Rename {
        from: String,
        to: String,
    },
    /// 刪除工作階段。 / Delete a session (default and current are protected).
    Delete {
        name: String,
    },
    /// 管理我的最愛。 / Mark or unmark favorite sessions.
    #[command(subcommand)]
    Favorite(FavoriteCommand),
    /// 將工作階段屬性寫入全域存放區。 / Merge a session's file properties into the global store.
    Push {
        name: String,
    },
    /// 將全域屬性寫回工作階段。 / Merge global file properties into a session.
    Pull {
        name: String,
    },
    /// 顯示全域屬性。 / Show global file properties, optionally for one path.
    Global {
        path: Option<String>,
    },
    /// 讀取或修改設定。 / Read or change settings.
    #[command(subcommand)]
    Settings(SettingsCommand),
}

#[derive(Args)]
struct ListArgs {
    /// 名稱篩選（不分大小寫）；`*` 代表全部。 / Case-insensitive name filter; `*` matches everything.
    #[arg(long, value_name = "FILTER")]
    filter: Option<String>,
    /// 僅列出我的最愛。 / Only list favorite sessions.
    #[arg(long)]
    favorites: bool,
}

#[derive(Subcommand)]
enum FavoriteCommand {
    /// 加入我的最愛。 / Mark a session as favorite.
    Add { name: String },
    /// 移出我的最愛。 / Remove a session from the favorites.
    Remove { name: String },
}

#[derive(Subcommand)]
enum SettingsCommand {
    /// 顯示設定值；未指定鍵時列出全部。 / Print one setting, or all of them.
    Get { key: Option<String> },
    /// 修改設定值。 / Change a setting.
    Set { key: String, value: String },
}

fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sessionmgr=warn")))
        .init();

    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let Cli { workspace, command } = Cli::parse();
    let workspace_root = resolve_workspace(workspace)?;
    let config_dir = workspace_root.join(CONFIG_DIR);
    tracing::debug!(config = %config_dir.display(), "opening session manager");
    let mut manager = SessionManager::open(&config_dir)
        .with_context(|| format!("failed to open sessions in {}", config_dir.display()))?;

    match command {
        Commands::List(args) => execute_list(&mut manager, args),
        Commands::New { name } => {
            manager.create(&name)?;
            println!("Created session '{}'", name.trim());
            Ok(())
        }
        Commands::Copy { from, name } => {
            let index = lookup(&manager, &from)?;
            manager.copy(index, &name)?;
            println!("Copied session '{from}' to '{}'", name.trim());
            Ok(())
        }
        Commands::Rename { from, to } => {
            let index = lookup(&manager, &from)?;
            manager.rename(index, &to)?;
            println!("Renamed session '{from}' to '{}'", to.trim());
            Ok(())
        }
        Commands::Delete { name } => {
            let index = lookup(&manager, &name)?;
            manager.delete(index)?;
            println!("Deleted session '{name}'");
            Ok(())
        }
        Commands::Favorite(subcommand) => execute_favorite(&mut manager, subcommand),
        Commands::Push { name } => {
            let index = lookup(&manager, &name)?;
            let report = manager.push_session(index)?;
            println!(
                "Pushed {} file(s) from '{name}' to {}",
                report.updated,
                manager.global().path().display()
            );
            Ok(())
        }
        Commands::Pull { name } => {
            let index = lookup(&manager, &name)?;
            let report = manager.pull_session(index)?;
            println!(
                "Updated {} of {} file(s) in '{name}'",
                report.updated, report.files
            );
            Ok(())
        }
        Commands::Global { path } => execute_global(&manager, path.as_deref()),
        Commands::Settings(subcommand) => execute_settings(&mut manager, subcommand),
    }
}

fn execute_list(manager: &mut SessionManager, args: ListArgs) -> Result<()> {
    let filter = args.filter.unwrap_or_default();
    let visible = manager.filter_sessions(&filter)?;
    let registry = manager.registry();
    let current = registry.resolve(SessionIndex::Current);
    let previous = registry.resolve(SessionIndex::Previous);

    let mut shown = 0;
    for index in visible {
        let descriptor = &registry.descriptors()[index];
        if args.favorites && !descriptor.favorite {
            continue;
        }
        let role = if Some(index) == current {
            '>'
        } else if Some(index) == previous {
            '<'
        } else {
            ' '
        };
        let favorite = if descriptor.favorite { '*' } else { ' ' };
        let modified: DateTime<Local> = descriptor.modified.into();
        println!(
            "{role}{favorite} {:<32} {}",
            descriptor.name,
            modified.format("%Y-%m-%d %H:%M")
        );
        shown += 1;
    }
    if shown == 0 {
        println!("No sessions in {}", registry.config().directory.display());
    }
    Ok(())
}

fn execute_favorite(manager: &mut SessionManager, command: FavoriteCommand) -> Result<()> {
    match command {
        FavoriteCommand::Add { name } => {
            let index = lookup(manager, &name)?;
            let name = session_name(manager, index)?;
            if manager.set_favorite(&name, true)? {
                println!("Added '{name}' to favorites");
            } else {
                println!("'{name}' is already a favorite");
            }
        }
        FavoriteCommand::Remove { name } => {
            if manager.set_favorite(&name, false)? {
                println!("Removed '{name}' from favorites");
            } else {
                println!("'{name}' is not a favorite");
            }
        }
    }
    Ok(())
}

fn execute_global(manager: &SessionManager, path: Option<&str>) -> Result<()> {
    let global = manager.global();
    match path {
        Some(path) => {
            let props = global
                .get(path)
                .ok_or_else(|| anyhow!("no global properties recorded for '{path}'"))?;
            print_props(path, props);
        }
        None => {
            if global.is_empty() {
                println!("Global store {} is empty", global.path().display());
            }
            for (path, props) in global.iter() {
                print_props(path, props);
            }
        }
    }
    Ok(())
}

fn print_props(path: &str, props: &FileProps) {
    let marks = props
        .marks
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",");
    println!(
        "{path}\tlang={}\tencoding={}\tfirstVisibleLine={}\tmarks={marks}",
        props.language, props.encoding, props.first_visible_line
    );
}

fn execute_settings(manager: &mut SessionManager, command: SettingsCommand) -> Result<()> {
    match command {
        SettingsCommand::Get { key: Some(key) } => {
            let key = parse_key(&key)?;
            println!("{}", manager.settings().settings().get(key));
        }
        SettingsCommand::Get { key: None } => {
            for key in SettingKey::ALL {
                println!("{key} = {}", manager.settings().settings().get(key));
            }
        }
        SettingsCommand::Set { key, value } => {
            let key = parse_key(&key)?;
            let value = SettingValue::parse(key.kind(), &value).map_err(anyhow::Error::msg)?;
            let mut rejected = None;
            manager.apply_settings(|settings| {
                if let Err(err) = settings.put(key, value.clone()) {
                    rejected = Some(err);
                }
            })?;
            if let Some(err) = rejected {
                bail!(err);
            }
            println!("{key} = {}", manager.settings().settings().get(key));
        }
    }
    Ok(())
}

fn parse_key(key: &str) -> Result<SettingKey> {
    key.parse().map_err(anyhow::Error::msg)
}

fn lookup(manager: &SessionManager, name: &str) -> Result<SessionIndex> {
    manager
        .registry()
        .position(name.trim())
        .map(SessionIndex::At)
        .ok_or_else(|| anyhow!("session '{}' not found", name.trim()))
}

fn session_name(manager: &SessionManager, index: SessionIndex) -> Result<String> {
    manager
        .registry()
        .name_of(index)
        .map(str::to_owned)
        .ok_or_else(|| anyhow!("session index {index} is not valid"))
}

fn resolve_workspace(workspace: Option<PathBuf>) -> Result<PathBuf> {
    match workspace {
        Some(path) => absolute(&path),
        None => std::env::current_dir().context("determine current directory"),
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()
            .context("determine current directory")?
            .join(path))
    }
}
