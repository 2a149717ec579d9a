/// Interactive Apple II disk image console

use a2disk::*;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use tracing_subscriber::EnvFilter;

/// Command completer for the REPL
struct CommandCompleter {
    commands: Vec<&'static str>,
}

impl CommandCompleter {
    fn new() -> Self {
        Self {
            commands: vec![
                "cat",
                "dir",
                "exit",
                "fs-export",
                "fs-info",
                "fs-list",
                "fs-read",
                "fs-switch",
                "help",
                "info",
                "load",
                "ls",
                "map",
                "open",
                "quit",
                "read-block",
                "read-sector",
                "validate",
                "vtoc",
            ],
        }
    }
}

impl Completer for CommandCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        // Only complete the command name
        let line_to_cursor = &line[..pos];
        if line_to_cursor.contains(' ') {
            return Ok((pos, vec![]));
        }

        let prefix = line_to_cursor.to_lowercase();
        let matches: Vec<Pair> = self
            .commands
            .iter()
            .filter(|cmd| cmd.starts_with(&prefix))
            .map(|cmd| Pair {
                display: cmd.to_string(),
                replacement: cmd.to_string(),
            })
            .collect();

        Ok((0, matches))
    }
}

impl Hinter for CommandCompleter {
    type Hint = String;
}

impl Highlighter for CommandCompleter {}
impl Validator for CommandCompleter {}
impl Helper for CommandCompleter {}

/// Get the path to the history file
fn history_path() -> Option<std::path::PathBuf> {
    dirs::home_dir().map(|mut p| {
        p.push(".a2dsk_history");
        p
    })
}

/// Log to stderr, filtered by `RUST_LOG` (default: warn)
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_logging();

    println!("=== A2DSK ===");
    println!("Interactive console for exploring Apple II DOS 3.3 and ProDOS disk images.");
    println!("Type 'help' for available commands\n");

    let mut rl = match Editor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("Failed to create editor: {}", e);
            std::process::exit(1);
        }
    };
    rl.set_helper(Some(CommandCompleter::new()));

    if let Some(history_path) = history_path() {
        let _ = rl.load_history(&history_path);
    }

    let mut image: Option<DiskImage> = None;
    let mut filesystem_mode = FileSystemType::Auto;

    loop {
        let input = match rl.readline("> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                if let Some(history_path) = history_path() {
                    let _ = rl.save_history(&history_path);
                }
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        };

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        let _ = rl.add_history_entry(input);

        let parts = parse_command_line(input);
        if parts.is_empty() {
            continue;
        }
        let command = parts[0].to_lowercase();

        match command.as_str() {
            "help" => {
                print_help();
            }
            "quit" | "exit" => {
                if let Some(history_path) = history_path() {
                    let _ = rl.save_history(&history_path);
                }
                println!("Goodbye!");
                break;
            }
            "open" | "load" => {
                if parts.len() < 2 {
                    println!("Usage: open <path>");
                    continue;
                }
                match DiskImage::open(&parts[1]) {
                    Ok(img) => {
                        println!("Opened: {} ({}, {} bytes)", parts[1], img.format(), img.len());
                        if let Err(e) = img.validate() {
                            println!("Warning: {}", e);
                        }
                        image = Some(img);
                    }
                    Err(e) => println!("Error: {}", e),
                }
            }
            "info" => {
                if let Some(ref img) = image {
                    print_info(img, filesystem_mode);
                } else {
                    println!("No image loaded. Use 'open <path>' first.");
                }
            }
            "validate" => {
                if let Some(ref img) = image {
                    match img.validate() {
                        Ok(()) => println!("Image size is valid for {}.", img.format()),
                        Err(e) => println!("Error: {}", e),
                    }
                } else {
                    println!("No image loaded.");
                }
            }
            "vtoc" => {
                if let Some(ref img) = image {
                    match Dos33FileSystem::from_image(img).read_vtoc() {
                        Some(vtoc) => print_vtoc(&vtoc),
                        None => println!("No VTOC at track 17, sector 0."),
                    }
                } else {
                    println!("No image loaded.");
                }
            }
            "map" => {
                if let Some(ref img) = image {
                    match effective_filesystem(img, filesystem_mode) {
                        FileSystemType::Prodos => {
                            match a2disk::map::render_block_map(&ProdosFileSystem::from_image(img)) {
                                Some(map) => print!("{}", map),
                                None => println!("No volume bitmap found."),
                            }
                        }
                        _ => match Dos33FileSystem::from_image(img).read_vtoc() {
                            Some(vtoc) => print!("{}", a2disk::map::render_free_sector_map(&vtoc)),
                            None => println!("No VTOC at track 17, sector 0."),
                        },
                    }
                } else {
                    println!("No image loaded.");
                }
            }
            "read-sector" => {
                if let Some(ref img) = image {
                    if parts.len() < 3 {
                        println!("Usage: read-sector <track> <sector>");
                        continue;
                    }
                    let track = parse_hex_or_dec(&parts[1]).and_then(|t| u8::try_from(t).ok());
                    let sector = parse_hex_or_dec(&parts[2]).and_then(|s| u8::try_from(s).ok());
                    let (Some(track), Some(sector)) = (track, sector) else {
                        println!("Invalid track or sector number.");
                        continue;
                    };

                    let address = TrackSector::new(track, sector);
                    match img.sectors().read(address) {
                        Some(data) => {
                            println!("{} ({} bytes):", address, data.len());
                            print_hex_dump(data, 256);
                        }
                        None => println!("Sector {} is out of range.", address),
                    }
                } else {
                    println!("No image loaded.");
                }
            }
            "read-block" => {
                if let Some(ref img) = image {
                    if parts.len() < 2 {
                        println!("Usage: read-block <block>");
                        continue;
                    }
                    let Some(block) = parse_hex_or_dec(&parts[1]) else {
                        println!("Invalid block number.");
                        continue;
                    };

                    match img.blocks().read_block(block) {
                        Some(data) => {
                            println!("Block {} ({} bytes):", block, data.len());
                            print_hex_dump(data, 512);
                        }
                        None => println!("Block {} is out of range.", block),
                    }
                } else {
                    println!("No image loaded.");
                }
            }
            "fs-info" => {
                if let Some(ref img) = image {
                    let fs = open_filesystem(img, filesystem_mode);
                    print!("{}", fs.info());
                } else {
                    println!("No image loaded.");
                }
            }
            "fs-list" | "dir" | "cat" | "ls" => {
                if let Some(ref img) = image {
                    match effective_filesystem(img, filesystem_mode) {
                        FileSystemType::Prodos => {
                            let volume = ProdosFileSystem::from_image(img);
                            let files = match parts.get(1) {
                                None => Ok(volume.entries()),
                                Some(dir) => volume.list_directory(dir),
                            };
                            match files {
                                Ok(files) => list_prodos(&files),
                                Err(e) => println!("Error: {}", e),
                            }
                        }
                        _ => list_dos(&Dos33FileSystem::from_image(img).catalog()),
                    }
                } else {
                    println!("No image loaded.");
                }
            }
            "fs-read" => {
                if let Some(ref img) = image {
                    if parts.len() < 2 {
                        println!("Usage: fs-read <filename>");
                        continue;
                    }

                    let fs = open_filesystem(img, filesystem_mode);
                    match fs.read_file(&parts[1]) {
                        Ok(data) => {
                            println!("File: {} ({} bytes)", parts[1], data.len());
                            print_hex_dump(&data, 256);
                        }
                        Err(e) => println!("Error: {}", e),
                    }
                } else {
                    println!("No image loaded.");
                }
            }
            "fs-export" => {
                if let Some(ref img) = image {
                    if parts.len() < 2 {
                        println!("Usage: fs-export <filename> [output_path]");
                        continue;
                    }
                    let src_filename = &parts[1];
                    let output_path = parts.get(2).unwrap_or(src_filename);

                    let fs = open_filesystem(img, filesystem_mode);
                    match fs.read_file(src_filename) {
                        Ok(data) => match std::fs::write(output_path, &data) {
                            Ok(_) => println!(
                                "Exported {} ({} bytes) to {}",
                                src_filename,
                                data.len(),
                                output_path
                            ),
                            Err(e) => println!("Error writing file: {}", e),
                        },
                        Err(e) => println!("Error reading file: {}", e),
                    }
                } else {
                    println!("No image loaded.");
                }
            }
            "fs-switch" => {
                if parts.len() < 2 {
                    let effective = match image {
                        Some(ref img) => effective_filesystem(img, filesystem_mode),
                        None => filesystem_mode,
                    };
                    println!("Filesystem mode: {} (effective: {})", filesystem_mode, effective);
                    println!("Options: auto, dos33, prodos");
                } else {
                    match FileSystemType::from_name(&parts[1]) {
                        Some(mode) => {
                            filesystem_mode = mode;
                            println!("Filesystem mode set to: {}", filesystem_mode);
                        }
                        None => {
                            println!("Unknown filesystem type: {}", parts[1]);
                            println!("Options: auto, dos33, prodos");
                        }
                    }
                }
            }
            _ => {
                println!("Unknown command: {}. Type 'help' for available commands.", command);
            }
        }
    }
}

fn effective_filesystem(image: &DiskImage, mode: FileSystemType) -> FileSystemType {
    match mode {
        FileSystemType::Auto => image.default_filesystem(),
        other => other,
    }
}

/// Parse command line input, respecting quoted strings
fn parse_command_line(input: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in input.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
            }
            ' ' | '\t' if !in_quotes => {
                if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
            }
            _ => {
                current.push(ch);
            }
        }
    }

    if !current.is_empty() {
        parts.push(current);
    }

    parts
}

fn print_help() {
    println!("Available commands:");
    println!("  open <path>                    - Open a disk image (.dsk/.do/.po/.hdv/.2mg)");
    println!("  info                           - Show image information");
    println!("  validate                       - Check the image size against its format");
    println!("  vtoc                           - Show the DOS 3.3 Volume Table Of Contents");
    println!("  map                            - Visual free-space map (VTOC or ProDOS bitmap)");
    println!("  read-sector <track> <sector>   - Hex dump a DOS 3.3 sector");
    println!("  read-block <block>             - Hex dump a ProDOS block");
    println!("  fs-info                        - Show filesystem information");
    println!("  fs-list [directory]            - List files (ls, dir, cat)");
    println!("  fs-read <filename>             - Read and hex dump a file");
    println!("  fs-export <file> [output_path] - Export a file to the host filesystem");
    println!("                                   (output_path defaults to the file name)");
    println!("  fs-switch [auto|dos33|prodos]  - Show or set filesystem type (auto follows the image format)");
    println!("  help                           - Show this help");
    println!("  quit, exit                     - Exit");
}

fn print_info(image: &DiskImage, mode: FileSystemType) {
    if let Some(filename) = image.filename() {
        println!("Filename: {}", filename);
    }
    println!("Format: {}", image.format().name());
    println!("Size: {} bytes ({} KB)", image.len(), image.len() / 1024);
    println!("Filesystem: {}", effective_filesystem(image, mode));
    println!("Valid size: {}", if image.validate().is_ok() { "Yes" } else { "No" });
}

fn print_vtoc(vtoc: &Vtoc) {
    println!("DOS version: {}", vtoc.dos_version);
    println!("Volume: {}", vtoc.volume_number);
    println!("Tracks per disk: {}", vtoc.tracks_per_disk);
    println!("Sectors per track: {}", vtoc.sectors_per_track);
    println!("Bytes per sector: {}", vtoc.bytes_per_sector);
    println!("First catalog sector: {}", vtoc.first_catalog);
    println!("Free sectors (count): {}", vtoc.free_sector_count);
    println!("Free sectors (bitmap): {}", vtoc.bitmap_free_sectors());
}

fn list_dos(files: &[DosFile<'_>]) {
    if files.is_empty() {
        println!("No files found.");
        return;
    }

    println!("{:<1} {:<2} {:<16} {:>4} {:>7} {:<5} {}", "L", "T", "Name", "Sect", "Size", "Raw", "T/S list");
    println!("{}", "-".repeat(50));
    for file in files {
        let entry = file.entry();
        println!(
            "{:<1} {:<2} {:<16} {:>4} {:>7} {:<5} {}",
            if file.locked() { "*" } else { " " },
            file.dos_file_type(),
            entry.name,
            entry.sector_count,
            file.size(),
            file.flags(),
            entry.ts_list
        );
    }
}

fn list_prodos(files: &[ProdosFile<'_>]) {
    if files.is_empty() {
        println!("No files found.");
        return;
    }

    println!("{:<15} {:<20} {:<12} {:>9} {}", "Name", "Storage", "Type", "Size", "Access");
    println!("{}", "-".repeat(68));
    for file in files {
        println!(
            "{:<15} {:<20} {:<12} {:>9} {}",
            file.name(),
            file.storage_type(),
            file.file_type(),
            file.size(),
            file.flags()
        );
    }
}

/// Hex dump with Apple II high-bit ASCII shown as plain text
fn print_hex_dump(data: &[u8], max_bytes: usize) {
    let len = data.len().min(max_bytes);

    for (i, chunk) in data[..len].chunks(16).enumerate() {
        print!("{:04X}: ", i * 16);

        for (j, byte) in chunk.iter().enumerate() {
            print!("{:02X} ", byte);
            if j == 7 {
                print!(" ");
            }
        }

        // Pad if less than 16 bytes
        for j in chunk.len()..16 {
            print!("   ");
            if j == 7 {
                print!(" ");
            }
        }

        print!(" |");

        for byte in chunk {
            let b = byte & 0x7F;
            let c = if (32..127).contains(&b) { b as char } else { '.' };
            print!("{}", c);
        }

        println!("|");
    }

    if data.len() > max_bytes {
        println!("... ({} more bytes)", data.len() - max_bytes);
    }
}

fn parse_hex_or_dec(s: &str) -> Option<u32> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else if let Some(hex) = s.strip_prefix('$') {
        u32::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}
