use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;
use xdat_editor::mirror::MirrorItem;
use xdat_editor::schema::SlotKind;
use xdat_editor::{
    Document, DocValue, EditorSession, EditorSettings, LoadedDocument, NodeId, Replacer, Schema,
    SearchCriteria, statics,
};

#[derive(Parser)]
#[command(
    name = statics::EN_APP_NAME,
    version,
    about = "Inspect and edit XDAT game UI descriptor documents"
)]
struct Cli {
    /// Settings file (JSON5); recent files are recorded here
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args)]
struct FilterArgs {
    /// Show only elements whose properties contain this text
    #[arg(long)]
    filter: Option<String>,
    /// Restrict matches to this variant
    #[arg(long = "type")]
    type_filter: Option<String>,
    /// Restrict matches to this property
    #[arg(long = "property")]
    property_filter: Option<String>,
    /// Treat the filter text as a regular expression
    #[arg(long)]
    regex: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Write an empty document
    New { output: PathBuf },
    /// Print the element tree
    Tree {
        file: PathBuf,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Dump one element as JSON5
    Show { file: PathBuf, path: String },
    /// Set a property to a JSON5 literal (e.g. '"Main"', 42, true, null)
    Set {
        file: PathBuf,
        path: String,
        property: String,
        value: String,
        /// Write here instead of over the input
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Replace text in every matching property
    Replace {
        file: PathBuf,
        search: String,
        replace: String,
        #[arg(long)]
        regex: bool,
        #[arg(long = "type")]
        type_filter: Option<String>,
        #[arg(long = "property")]
        property_filter: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Export one window to a standalone file (`.xdatwin` unless given)
    Export {
        file: PathBuf,
        path: String,
        output: PathBuf,
    },
    /// Append a previously exported window to the document
    Import {
        file: PathBuf,
        window: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List recently opened documents
    Recent,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    let mut settings = match &cli.settings {
        Some(path) => EditorSettings::load_path(path)?,
        None => EditorSettings::default(),
    };
    let schema = Schema::ui_descriptor()?;

    match cli.command {
        Command::New { output } => {
            let document = Document::new(schema)?;
            let mut session = EditorSession::new(document, statics::XD_LIST_WINDOWS, &settings)?;
            session.save_to_path(&output)?;
            println!("wrote {}", output.display());
        }
        Command::Tree { file, filter } => {
            let mut session = open(&file, &schema, &mut settings)?;
            let criteria = SearchCriteria::new(
                filter.filter.as_deref().unwrap_or_default(),
                filter.type_filter.as_deref(),
                filter.property_filter.as_deref(),
                filter.regex,
            );
            let matches = session.set_criteria(criteria)?;
            println!("{}", session.title());
            if let Some(root) = session.mirror().root() {
                print_tree(&session, root, 0);
            }
            if !session.criteria().is_empty() {
                println!("{} {matches}", statics::EN_MIRROR_MATCHES);
            }
        }
        Command::Show { file, path } => {
            let session = open(&file, &schema, &mut settings)?;
            let node = find(&session, &path)?;
            let entity = session
                .mirror()
                .entity_of(node)
                .ok_or_else(|| anyhow!("{path} is a list, not an element"))?;
            println!(
                "{}",
                DocValue::from_entity(session.document(), entity).to_json5_pretty()
            );
        }
        Command::Set {
            file,
            path,
            property,
            value,
            output,
        } => {
            let mut session = open(&file, &schema, &mut settings)?;
            let node = find(&session, &path)?;
            let entity = session
                .mirror()
                .entity_of(node)
                .ok_or_else(|| anyhow!("{path} is a list, not an element"))?;
            let variant = session.document().variant_of(entity).unwrap_or_default();
            let kind = match session.document().schema().slot(variant, &property) {
                Some(slot) if slot.is_property() => match slot.kind {
                    SlotKind::Attribute(kind) => kind,
                    _ => bail!("{variant}.{property} is not a property"),
                },
                _ => bail!("{variant} has no editable property {property}"),
            };
            let literal = DocValue::parse_json5(&value)?;
            let attr = literal.to_attr(kind).ok_or_else(|| {
                anyhow!(
                    "{} does not fit {variant}.{property} ({kind:?})",
                    literal.type_name()
                )
            })?;
            session.set_property(node, &property, attr)?;
            if let Some(description) = session.history().undo_description() {
                println!("{description}");
            }
            save(&mut session, output.as_deref().unwrap_or(&file))?;
        }
        Command::Replace {
            file,
            search,
            replace,
            regex,
            type_filter,
            property_filter,
            output,
        } => {
            let mut session = open(&file, &schema, &mut settings)?;
            let replacer = Replacer::new(&search, &replace)
                .regex(regex)
                .type_filter(type_filter.as_deref())
                .property_filter(property_filter.as_deref());
            let count = session.replace_all(&replacer)?;
            match session.history().undo_description() {
                Some(description) if count > 0 => println!("{description}"),
                _ => println!("no occurrences of '{search}'"),
            }
            if count > 0 {
                save(&mut session, output.as_deref().unwrap_or(&file))?;
            }
        }
        Command::Export {
            file,
            path,
            mut output,
        } => {
            if output.extension().is_none() {
                output.set_extension(statics::WINDOW_FILE_EXTENSION);
            }
            let session = open(&file, &schema, &mut settings)?;
            let node = find(&session, &path)?;
            session.export_window(node, &output)?;
            println!("exported {path} to {}", output.display());
        }
        Command::Import {
            file,
            window,
            output,
        } => {
            let mut session = open(&file, &schema, &mut settings)?;
            let node = session.import_window(&window)?;
            println!(
                "imported {}",
                session.mirror().path_of(session.document(), node)
            );
            save(&mut session, output.as_deref().unwrap_or(&file))?;
        }
        Command::Recent => {
            for recent in settings.recent_files() {
                println!("{}", recent.path.display());
            }
        }
    }

    if let Some(path) = &cli.settings {
        settings.save_path(path)?;
    }
    Ok(())
}

fn open(
    path: &Path,
    schema: &std::sync::Arc<Schema>,
    settings: &mut EditorSettings,
) -> Result<EditorSession> {
    let loaded = LoadedDocument::load_path(path, schema)?;
    let session = EditorSession::open(loaded, statics::XD_LIST_WINDOWS, settings)
        .with_context(|| format!("opening {path:?}"))?;
    settings.add_recent_file(path);
    Ok(session)
}

fn save(session: &mut EditorSession, path: &Path) -> Result<()> {
    session.save_to_path(path)?;
    info!(?path, "saved");
    Ok(())
}

fn find(session: &EditorSession, path: &str) -> Result<NodeId> {
    session
        .mirror()
        .find_path(session.document(), path)
        .ok_or_else(|| anyhow!("no element at {path}"))
}

fn print_tree(session: &EditorSession, node: NodeId, depth: usize) {
    let mirror = session.mirror();
    let label = match mirror.item(node) {
        Some(MirrorItem::List(holder)) => format!("{} [{}]", holder.field(), holder.element_type),
        Some(MirrorItem::Entity(entity)) => {
            let document = session.document();
            format!(
                "{} ({})",
                document.display_name(*entity),
                document.variant_of(*entity).unwrap_or_default()
            )
        }
        None => return,
    };
    println!("{}{label}", "  ".repeat(depth));
    for child in mirror.children(node) {
        print_tree(session, *child, depth + 1);
    }
}
