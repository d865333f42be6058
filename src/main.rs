use std::path::{Path, PathBuf};
use clap::Parser;
use log::error;
use music_shelf::{
    AppConfig, LibraryError, MetadataExtractor, PlaylistKind, Result, SortState, TrackFilter, TrackRecord,
    audio::editor::EditableFields,
    config::AppDirs,
    library::{filter::select_matching, tags, Library},
    playlist,
    utils::parallel::ParallelProcessor,
};
use music_shelf::cli::commands::{Cli, Commands, PlaylistCommands};
use music_shelf::cli::player;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    MetadataExtractor::init_parallel_processing(cli.threads);

    if let Err(e) = run(cli) {
        error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let dirs = AppDirs::resolve(cli.app_dir)?;
    let config_path = dirs.config_path();
    let mut config = AppConfig::load(&config_path);

    match cli.command {
        Commands::Root { dir } => {
            let Some(dir) = dir else {
                match &config.music_root {
                    Some(root) => println!("{}", root.display()),
                    None => println!("No music root configured"),
                }
                return Ok(());
            };
            if !dir.is_dir() {
                return Err(LibraryError::FileMissing(dir));
            }
            let dir = dir.canonicalize()?;
            config.music_root = Some(dir.clone());
            config.save(&config_path)?;
            println!("Music root set to {}", dir.display());

            let mut library = Library::open(&dir)?;
            scan(&mut library)
        }

        Commands::Scan => {
            let mut library = open_library(&config)?;
            scan(&mut library)
        }

        Commands::List { filter, sort, playlist, json } => {
            let library = open_library(&config)?;
            let mut tracks = library.tracks(&TrackFilter::from(filter))?;

            let mut sort_state = SortState::new();
            for column in sort {
                sort_state.request(column);
            }
            sort_state.apply(&mut tracks);

            let selected = match playlist {
                Some(name) => {
                    let path = resolve_playlist(&dirs, &name)?;
                    select_matching(&tracks, &playlist::load(&path, library.root())?)
                }
                None => Vec::new(),
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&tracks)?);
            } else {
                print_tracks(&tracks, &sort_state, &selected);
            }
            Ok(())
        }

        Commands::Tag { id, tags: new_tags } => {
            let library = open_library(&config)?;
            library.set_tags(id, new_tags.trim())?;
            println!("Tags for #{} set to '{}'", id, new_tags.trim());
            Ok(())
        }

        Commands::BulkTag { operation, tags: input, ids } => {
            let library = open_library(&config)?;
            let report = library.bulk_edit_tags(&ids, operation, &input);
            println!("{}", report.summary("Updated", "songs"));
            Ok(())
        }

        Commands::Suggest { text, cursor, apply } => {
            let library = open_library(&config)?;
            let cursor = cursor.unwrap_or_else(|| text.chars().count());
            match apply {
                Some(tag) => {
                    let (new_text, _) = tags::apply_suggestion(&text, cursor, &tag);
                    println!("{}", new_text);
                }
                None => {
                    for suggestion in library.suggest_tags(&text, cursor)? {
                        println!("{}", suggestion);
                    }
                }
            }
            Ok(())
        }

        Commands::Rename { id, new_name, allow_extension_change } => {
            let library = open_library(&config)?;
            let track = library.rename(id, &new_name, allow_extension_change)?;
            println!("Renamed #{} to {}", id, track.relative_path);
            Ok(())
        }

        Commands::Delete { ids, yes } => {
            if !yes {
                return Err(LibraryError::InvalidInput(format!(
                    "refusing to delete {} file(s) without --yes; this cannot be undone",
                    ids.len()
                )));
            }
            let library = open_library(&config)?;
            let report = library.delete(&ids);
            println!("{}", report.summary("Deleted", "files"));
            Ok(())
        }

        Commands::EditMeta { id, fields } => {
            let library = open_library(&config)?;
            let mut current = library.read_fields(id)?;
            if fields.is_empty() {
                print_fields(&current);
                return Ok(());
            }
            fields.merge_into(&mut current);
            library.edit_metadata(id, &current)?;
            println!("Metadata saved for #{}", id);
            Ok(())
        }

        Commands::Play { id, volume, seek } => {
            let library = open_library(&config)?;
            player::run(&library, id, volume, seek)
        }

        Commands::Playlist { action } => run_playlist(action, &dirs, &config),
    }
}

fn run_playlist(action: PlaylistCommands, dirs: &AppDirs, config: &AppConfig) -> Result<()> {
    match action {
        PlaylistCommands::Create { name, kind, dest, overwrite, ids, filter } => {
            let name = name.trim();
            if name.is_empty() {
                return Err(LibraryError::InvalidInput("Please enter a playlist name".into()));
            }
            let library = open_library(config)?;
            let tracks: Vec<TrackRecord> = if ids.is_empty() {
                library.tracks(&TrackFilter::from(filter))?
            } else {
                ids.iter().map(|&id| library.track(id)).collect::<Result<_>>()?
            };
            if tracks.is_empty() {
                return Err(LibraryError::InvalidInput("No songs selected for the playlist".into()));
            }

            let dest_dir = match dest {
                Some(dir) => dir,
                None => dirs.playlists_dir()?,
            };
            let target = match kind.extension() {
                Some(ext) => dest_dir.join(format!("{}.{}", name, ext)),
                None => dest_dir.join(name),
            };

            let report = playlist::export(&tracks, library.root(), kind, &target, overwrite)?;
            match kind {
                PlaylistKind::Folder => println!("{}", report.summary("Copied", "files")),
                _ => println!("Created {} playlist with {} songs", kind, report.succeeded),
            }
            println!("{}", target.display());
            Ok(())
        }

        PlaylistCommands::Load { playlist: name } => {
            let library = open_library(config)?;
            let path = resolve_playlist(dirs, &name)?;
            let songs = playlist::load(&path, library.root())?;
            let tracks: Vec<TrackRecord> = library
                .tracks(&TrackFilter::default())?
                .into_iter()
                .filter(|track| songs.contains(&track.relative_path))
                .collect();

            println!("Loaded playlist: {} ({} songs)", display_stem(&path), songs.len());
            print_tracks(&tracks, &SortState::new(), &[]);
            Ok(())
        }

        PlaylistCommands::List => {
            let saved = playlist::list_saved(&dirs.playlists_dir()?)?;
            if saved.is_empty() {
                println!("No saved playlists");
            }
            for (idx, entry) in saved.iter().enumerate() {
                println!(
                    "{:>3}  {:<30} {:<5} {:>5} songs  {}",
                    idx + 1,
                    entry.name,
                    entry.kind,
                    entry.song_count,
                    entry.path.display()
                );
            }
            Ok(())
        }

        PlaylistCommands::Delete { playlist: name } => {
            let path = resolve_playlist(dirs, &name)?;
            playlist::delete_saved(&path)?;
            println!("Playlist '{}' deleted", display_stem(&path));
            Ok(())
        }

        PlaylistCommands::Copy { playlist: name, dest } => {
            let path = resolve_playlist(dirs, &name)?;
            playlist::copy_saved(&path, &dest)?;
            println!("Playlist exported to: {}", dest.display());
            Ok(())
        }
    }
}

fn open_library(config: &AppConfig) -> Result<Library> {
    let root = config.music_root.as_ref().ok_or(LibraryError::NoMusicRoot)?;
    Library::open(root)
}

fn scan(library: &mut Library) -> Result<()> {
    let summary = library.scan(|progress| {
        println!(
            "Scanning: {}/{} - {}",
            progress.processed, progress.total, progress.current_file
        );
    })?;
    println!(
        "Scan complete: {} songs ({} kept their tags)",
        summary.inserted, summary.preserved_tags
    );
    Ok(())
}

/// A playlist argument is either a path to a file or the name of a saved
/// playlist.
fn resolve_playlist(dirs: &AppDirs, name: &str) -> Result<PathBuf> {
    let direct = PathBuf::from(name);
    if direct.is_file() {
        return Ok(direct);
    }
    let saved_dir = dirs.playlists_dir()?;
    for kind in [PlaylistKind::M3u, PlaylistKind::Pls, PlaylistKind::Json] {
        if let Some(ext) = kind.extension() {
            let candidate = saved_dir.join(format!("{}.{}", name, ext));
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
    }
    Err(LibraryError::FileMissing(direct))
}

fn display_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn print_tracks(tracks: &[TrackRecord], sort_state: &SortState, selected: &[i64]) {
    use music_shelf::SortColumn::{Album, Artist, Filename, Id, Path as PathCol, Tags};

    println!(
        "  {:>6}  {:<40} {:<24} {:<20} {:<20} {}",
        sort_state.heading(Id),
        sort_state.heading(Filename),
        sort_state.heading(PathCol),
        sort_state.heading(Artist),
        sort_state.heading(Album),
        sort_state.heading(Tags)
    );
    for track in tracks {
        let marker = if selected.contains(&track.id) { '*' } else { ' ' };
        println!(
            "{} {:>6}  {:<40} {:<24} {:<20} {:<20} {}",
            marker,
            track.id,
            track.filename,
            track.parent_dir(),
            track.artist,
            track.album,
            track.tags
        );
    }
    println!("{} songs", tracks.len());
}

fn print_fields(fields: &EditableFields) {
    let rows = [
        ("Title", &fields.title),
        ("Artist", &fields.artist),
        ("Album", &fields.album),
        ("Year", &fields.year),
        ("Track", &fields.track),
        ("Genre", &fields.genre),
        ("Album Artist", &fields.album_artist),
        ("Comment", &fields.comment),
    ];
    for (label, value) in rows {
        println!("{:<13} {}", format!("{}:", label), value);
    }
}
