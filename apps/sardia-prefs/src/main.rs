//! # Sardia Prefs
//!
//! A standalone CLI preference tracker built on the Sardia document API.
//! Every device holds a replicated last-write-wins map of settings; edits
//! made offline merge deterministically once the devices sync, with the
//! newest write winning each key.
//!
//! ## Preference model (LWW map)
//!
//! ```text
//! key: "theme"  →  { value: "dark", timestamp: 2050, client: 3 }
//! winner per key = highest (timestamp, client id) pair
//! deletes keep tombstones so they replicate like writes
//! ```

use std::collections::HashMap;
use std::io::{self, Write};

use clap::{Parser, Subcommand};
use colored::*;
use lwm_doc::{Document, Value};
use lwm_wire::encode_snapshot;

// ─── CLI ───────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "sardia-prefs")]
#[command(about = "LWW-map based preference sync across devices (Sardia)")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Basic demo: two devices edit preferences, sync, and converge
    Demo,
    /// Conflict scenario: equal-timestamp writes, client tie-breaks, delete ties
    Conflict,
    /// Network partition simulation: split, independent edits, heal, full convergence
    Partition,
    /// Interactive REPL for manual experimentation
    Interactive,
}

// ─── Device: a simulated node holding a Document ───────────────────────────

/// Each Device owns a `Document` keyed by preference name. Sync ships the
/// delta the peer's state vector is missing, encoded in the wire format.
struct Device {
    name: String,
    doc: Document,
}

impl Device {
    fn new(name: &str, client_id: u32) -> Self {
        Self {
            name: name.to_string(),
            doc: Document::new(client_id),
        }
    }

    /// One-way sync: pull everything `other` has that this device lacks.
    fn sync_from(&mut self, other: &Device) -> usize {
        let delta = other.doc.snapshot_for(self.doc.state_vector());
        let bytes = encode_snapshot(&delta);
        self.doc.apply_encoded(&bytes).unwrap();
        bytes.len()
    }

    /// Apply an already-encoded snapshot, e.g. a state carried between demos.
    fn apply_bytes(&mut self, bytes: &[u8]) {
        self.doc.apply_encoded(bytes).unwrap();
    }
}

// ─── Pretty printing ──────────────────────────────────────────────────────

fn header(text: &str) {
    let bar = "═".repeat(60);
    println!("\n{}", bar.bright_cyan());
    println!("  {}", text.bold().bright_white());
    println!("{}", bar.bright_cyan());
}

fn section(text: &str) {
    println!("\n{} {}", "▸".bright_yellow(), text.bold());
}

fn step(text: &str) {
    println!("  {} {}", "•".bright_green(), text);
}

fn sync_arrow(from: &str, to: &str, bytes: usize) {
    println!(
        "  {} {} {} {} ({} bytes)",
        from.bright_magenta(),
        "──sync──▶".bright_cyan(),
        to.bright_magenta(),
        "✓".bright_green(),
        bytes
    );
}

fn show_device(device: &Device) {
    let border = "─".repeat(52);
    println!("  ┌{}┐", border);
    println!(
        "  │ {:^50} │",
        format!("Device: {}", device.name).bright_yellow().to_string()
    );
    println!("  ├{}┤", border);

    if device.doc.is_empty() {
        println!("  │ {:^50} │", "(no preferences)".dimmed().to_string());
    } else {
        let mut keys: Vec<String> = device.doc.iter().map(|(k, _)| k.to_string()).collect();
        keys.sort();
        for key in &keys {
            let value = device.doc.get(key).map(|v| v.to_string()).unwrap_or_default();
            let meta = match device.doc.entry(key) {
                Some(entry) => format!("(t={}, c={})", entry.timestamp, entry.client_id),
                None => String::new(),
            };
            let line = format!("  {:<14} = {:<16} {}", key, value, meta);
            println!("  │ {:<50} │", line);
        }
    }

    let tombstones = device.doc.snapshot_since(0.0).len() - device.doc.len();
    if tombstones > 0 {
        println!(
            "  │ {:<50} │",
            format!("  ({} tombstone{})", tombstones, if tombstones == 1 { "" } else { "s" })
                .dimmed()
                .to_string()
        );
    }
    println!("  └{}┘", border);
}

fn convergence_check(devices: &[&Device]) -> bool {
    if devices.len() < 2 {
        return true;
    }
    let base = devices[0].doc.to_map();
    devices[1..].iter().all(|d| d.doc.to_map() == base)
}

fn convergence_result(converged: bool) {
    if converged {
        println!(
            "\n  {} {}",
            "✓".bright_green().bold(),
            "ALL DEVICES CONVERGED — preferences are identical!"
                .bright_green()
                .bold()
        );
    } else {
        println!(
            "\n  {} {}",
            "✗".bright_red().bold(),
            "DIVERGENCE DETECTED — devices differ!"
                .bright_red()
                .bold()
        );
    }
}

// ─── Demo ──────────────────────────────────────────────────────────────────

fn run_demo() {
    header("DEMO — Basic Preference Tracking & LWW Sync");

    section("Phase 1: Two devices edit preferences independently");
    let mut phone = Device::new("phone", 1);
    let mut laptop = Device::new("laptop", 2);

    phone.doc.set_at("theme", "dark", 1000.0);
    step("phone:  theme = dark         (t=1000)");
    phone.doc.set_at("volume", 40, 1010.0);
    step("phone:  volume = 40          (t=1010)");

    laptop.doc.set_at("volume", 70, 1020.0);
    step("laptop: volume = 70          (t=1020)");
    laptop.doc.set_at("notifications", true, 1030.0);
    step("laptop: notifications = true (t=1030)");

    show_device(&phone);
    show_device(&laptop);

    section("Phase 2: Bidirectional sync over the wire format");
    let bytes = phone.sync_from(&laptop);
    sync_arrow("laptop", "phone", bytes);
    let bytes = laptop.sync_from(&phone);
    sync_arrow("phone", "laptop", bytes);

    section("Phase 3: Post-sync state");
    show_device(&phone);
    show_device(&laptop);

    let ok = convergence_check(&[&phone, &laptop]);
    convergence_result(ok);

    section("Final values");
    step(&format!(
        "theme = {} (only phone wrote it)",
        phone.doc.get("theme").unwrap()
    ));
    step(&format!(
        "volume = {} (laptop wrote at t=1020, phone at t=1010)",
        phone.doc.get("volume").unwrap()
    ));
    step(&format!(
        "notifications = {} (only laptop wrote it)",
        phone.doc.get("notifications").unwrap()
    ));
}

// ─── Conflict ──────────────────────────────────────────────────────────────

fn run_conflict() {
    header("CONFLICT — Equal Timestamps, Client Tie-Breaks, Delete Ties");

    section("Phase 1: Three devices write 'volume' at the same instant");
    let mut phone = Device::new("phone", 1);
    let mut tablet = Device::new("tablet", 2);
    let mut laptop = Device::new("laptop", 3);

    phone.doc.set_at("volume", 40, 5000.0);
    step("phone  (client 1): volume = 40 at t=5000");
    tablet.doc.set_at("volume", 70, 5000.0);
    step("tablet (client 2): volume = 70 at t=5000");
    laptop.doc.set_at("volume", 55, 5000.0);
    step("laptop (client 3): volume = 55 at t=5000");

    section("Phase 2: Merge in 3 different orders to prove order independence");

    // Order A: phone ← tablet ← laptop
    let mut order_a = Device::new("order-A", 10);
    order_a.sync_from(&phone);
    order_a.sync_from(&tablet);
    order_a.sync_from(&laptop);
    step(&format!(
        "Order A (phone→tablet→laptop): volume = {}",
        order_a.doc.get("volume").unwrap()
    ));

    // Order B: laptop ← phone ← tablet
    let mut order_b = Device::new("order-B", 11);
    order_b.sync_from(&laptop);
    order_b.sync_from(&phone);
    order_b.sync_from(&tablet);
    step(&format!(
        "Order B (laptop→phone→tablet): volume = {}",
        order_b.doc.get("volume").unwrap()
    ));

    // Order C: tablet ← laptop ← phone
    let mut order_c = Device::new("order-C", 12);
    order_c.sync_from(&tablet);
    order_c.sync_from(&laptop);
    order_c.sync_from(&phone);
    step(&format!(
        "Order C (tablet→laptop→phone): volume = {}",
        order_c.doc.get("volume").unwrap()
    ));

    let ok = convergence_check(&[&order_a, &order_b, &order_c]);
    convergence_result(ok);
    step("volume = 55 everywhere: at equal timestamps the highest client id wins");

    section("Phase 3: A delete never beats a write at the same timestamp");
    tablet.doc.set_at("alerts", true, 6000.0);
    step("tablet (client 2): alerts = true at t=6000");
    phone.doc.remove_at("alerts", 6000.0);
    step("phone  (client 1): delete alerts  at t=6000");

    let bytes = phone.sync_from(&tablet);
    sync_arrow("tablet", "phone", bytes);
    let bytes = tablet.sync_from(&phone);
    sync_arrow("phone", "tablet", bytes);

    step(&format!(
        "phone:  alerts = {:?}",
        phone.doc.get("alerts")
    ));
    step(&format!(
        "tablet: alerts = {:?}",
        tablet.doc.get("alerts")
    ));
    if phone.doc.has("alerts") && tablet.doc.has("alerts") {
        step("The write survived on both devices ✓");
    }

    section("Phase 4: Idempotence — applying the same delta twice");
    let before = order_a.doc.to_map();
    order_a.sync_from(&phone);
    order_a.sync_from(&phone); // intentional duplicate
    let after = order_a.doc.to_map();
    if before.get("volume") == after.get("volume") {
        step("Idempotent ✓  re-applied deltas changed nothing");
    } else {
        step("IDEMPOTENCE FAILURE ✗");
    }
}

// ─── Partition ─────────────────────────────────────────────────────────────

fn run_partition() {
    header("PARTITION — Network Split, Independent Edits, Heal & Converge");

    section("Phase 1: Create 4 devices in 2 groups, establish shared baseline");
    let mut phone = Device::new("phone", 1);
    let mut tablet = Device::new("tablet", 2);
    let mut laptop = Device::new("laptop", 3);
    let mut desktop = Device::new("desktop", 4);

    phone.doc.set_at("theme", "light", 1000.0);
    phone.doc.set_at("dnd", false, 1001.0);
    // Sync baseline to all
    tablet.sync_from(&phone);
    laptop.sync_from(&phone);
    desktop.sync_from(&phone);
    step("Baseline: theme = light, dnd = false, synced to all 4 devices");

    section("Phase 2: NETWORK PARTITION");
    println!(
        "  {}   {}",
        "╔══════════════════╗".bright_blue(),
        "╔══════════════════╗".bright_red()
    );
    println!(
        "  {}   {}",
        "║  MOBILE          ║".bright_blue(),
        "║  DESK            ║".bright_red()
    );
    println!(
        "  {}   {}",
        "║  phone, tablet   ║".bright_blue(),
        "║  laptop, desktop ║".bright_red()
    );
    println!(
        "  {}   {}",
        "╚══════════════════╝".bright_blue(),
        "╚══════════════════╝".bright_red()
    );
    println!(
        "  {}",
        "         ╳╳╳ PARTITION ╳╳╳".bright_red().bold()
    );

    // Mobile-side edits
    phone.doc.set_at("theme", "dark", 2000.0);
    tablet.doc.set_at("dnd", true, 2100.0);
    phone.sync_from(&tablet);
    tablet.sync_from(&phone);
    step("Mobile: phone set theme = dark (t=2000); tablet set dnd = true (t=2100)");
    step("Mobile internal sync complete");

    // Desk-side edits
    laptop.doc.set_at("theme", "solarized", 2050.0);
    desktop.doc.set_at("font_size", 14, 2200.0);
    laptop.sync_from(&desktop);
    desktop.sync_from(&laptop);
    step("Desk: laptop set theme = solarized (t=2050); desktop set font_size = 14 (t=2200)");
    step("Desk internal sync complete");

    section("Pre-heal state");
    show_device(&phone);
    show_device(&laptop);

    section("Phase 3: PARTITION HEALS");
    println!(
        "  {}",
        "         ════ HEALED ════".bright_green().bold()
    );

    // Carry each side's full state as encoded snapshots, then mesh-apply
    let mobile_state = encode_snapshot(&phone.doc.snapshot_since(0.0));
    let desk_state = encode_snapshot(&laptop.doc.snapshot_since(0.0));

    for device in [&mut phone, &mut tablet, &mut laptop, &mut desktop] {
        device.apply_bytes(&mobile_state);
        device.apply_bytes(&desk_state);
    }
    sync_arrow("mobile", "desk", desk_state.len());
    sync_arrow("desk", "mobile", mobile_state.len());
    step("Full mesh sync across all 4 devices");

    section("Phase 4: Post-heal state");
    show_device(&phone);
    show_device(&laptop);

    let ok = convergence_check(&[&phone, &tablet, &laptop, &desktop]);
    convergence_result(ok);

    step(&format!(
        "theme     = {} (t=2050 beats dark at t=2000, arrival order irrelevant)",
        phone.doc.get("theme").unwrap()
    ));
    step(&format!(
        "dnd       = {} (tablet's t=2100 beats the baseline)",
        phone.doc.get("dnd").unwrap()
    ));
    step(&format!(
        "font_size = {} (only desktop wrote it)",
        phone.doc.get("font_size").unwrap()
    ));
}

// ─── Interactive REPL ──────────────────────────────────────────────────────

fn parse_value(raw: &str) -> Value {
    if raw == "true" {
        return Value::Bool(true);
    }
    if raw == "false" {
        return Value::Bool(false);
    }
    if let Ok(n) = raw.parse::<i32>() {
        return Value::Int(n);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return Value::Float64(f);
    }
    Value::String(raw.to_string())
}

fn run_interactive() {
    header("INTERACTIVE REPL — Sardia Preference Tracker");

    let mut devices: HashMap<String, Device> = HashMap::new();
    let mut next_client_id: u32 = 1;

    println!();
    println!("  {}", "Commands:".bold().underline());
    println!(
        "    {} <name>              Create a new device",
        "device".bright_cyan()
    );
    println!(
        "    {} <device> <key> <value>   Set a preference (bool/int/float/string)",
        "set".bright_cyan()
    );
    println!(
        "    {} <device> <key>           Delete a preference (leaves a tombstone)",
        "del".bright_cyan()
    );
    println!(
        "    {} <from> <to>         Ship the delta from → to",
        "sync".bright_cyan()
    );
    println!(
        "    {} <name>           Sync bidirectionally with all others",
        "syncall".bright_cyan()
    );
    println!(
        "    {} <name>              Show device state",
        "show".bright_cyan()
    );
    println!(
        "    {}                     Show all devices",
        "list".bright_cyan()
    );
    println!(
        "    {} <d1> <d2>          Check convergence between two devices",
        "check".bright_cyan()
    );
    println!(
        "    {} <device> <key>         Show the stored entry with its metadata",
        "entry".bright_cyan()
    );
    println!(
        "    {}                     Exit",
        "quit".bright_cyan()
    );
    println!();

    loop {
        print!("{}", "sardia> ".bright_cyan().bold());
        io::stdout().flush().unwrap();

        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() || input.is_empty() {
            break;
        }
        let parts: Vec<&str> = input.trim().split_whitespace().collect();
        if parts.is_empty() {
            continue;
        }

        match parts[0] {
            "device" | "d" => {
                if parts.len() < 2 {
                    println!("  {} Usage: device <name>", "!".bright_red());
                    continue;
                }
                let name = parts[1];
                if devices.contains_key(name) {
                    println!("  {} Device '{}' already exists", "!".bright_yellow(), name);
                } else {
                    devices.insert(name.to_string(), Device::new(name, next_client_id));
                    step(&format!(
                        "Created device '{}' (client id {})",
                        name, next_client_id
                    ));
                    next_client_id += 1;
                }
            }

            "set" | "s" => {
                if parts.len() < 4 {
                    println!(
                        "  {} Usage: set <device> <key> <value>",
                        "!".bright_red()
                    );
                    continue;
                }
                if let Some(device) = devices.get_mut(parts[1]) {
                    let value = parse_value(&parts[3..].join(" "));
                    device.doc.set(parts[2], value.clone());
                    step(&format!("{}.{} = {}", parts[1], parts[2], value));
                } else {
                    println!("  {} Unknown device '{}'", "!".bright_red(), parts[1]);
                }
            }

            "del" | "rm" => {
                if parts.len() < 3 {
                    println!("  {} Usage: del <device> <key>", "!".bright_red());
                    continue;
                }
                if let Some(device) = devices.get_mut(parts[1]) {
                    device.doc.remove(parts[2]);
                    step(&format!(
                        "{}.{} deleted (tombstone recorded)",
                        parts[1], parts[2]
                    ));
                } else {
                    println!("  {} Unknown device '{}'", "!".bright_red(), parts[1]);
                }
            }

            "sync" => {
                if parts.len() < 3 {
                    println!("  {} Usage: sync <from> <to>", "!".bright_red());
                    continue;
                }
                let (from, to) = (parts[1], parts[2]);
                if !devices.contains_key(from) {
                    println!("  {} Unknown device '{}'", "!".bright_red(), from);
                    continue;
                }
                if !devices.contains_key(to) {
                    println!("  {} Unknown device '{}'", "!".bright_red(), to);
                    continue;
                }
                let delta = encode_snapshot(
                    &devices[from].doc.snapshot_for(devices[to].doc.state_vector()),
                );
                devices.get_mut(to).unwrap().doc.apply_encoded(&delta).unwrap();
                sync_arrow(from, to, delta.len());
            }

            "syncall" => {
                if parts.len() < 2 {
                    println!("  {} Usage: syncall <name>", "!".bright_red());
                    continue;
                }
                let target = parts[1].to_string();
                if !devices.contains_key(&target) {
                    println!("  {} Unknown device '{}'", "!".bright_red(), target);
                    continue;
                }
                // Pull all others into target
                let deltas: Vec<Vec<u8>> = devices
                    .iter()
                    .filter(|(k, _)| **k != target)
                    .map(|(_, d)| {
                        encode_snapshot(
                            &d.doc.snapshot_for(devices[&target].doc.state_vector()),
                        )
                    })
                    .collect();
                let t = devices.get_mut(&target).unwrap();
                for delta in &deltas {
                    t.doc.apply_encoded(delta).unwrap();
                }
                // Push target out to all others
                let other_names: Vec<String> = devices
                    .keys()
                    .filter(|k| **k != target)
                    .cloned()
                    .collect();
                for name in &other_names {
                    let delta = encode_snapshot(
                        &devices[&target]
                            .doc
                            .snapshot_for(devices[name].doc.state_vector()),
                    );
                    devices.get_mut(name).unwrap().doc.apply_encoded(&delta).unwrap();
                }
                step(&format!(
                    "'{}' synced bidirectionally with {} others",
                    target,
                    other_names.len()
                ));
            }

            "show" => {
                if parts.len() < 2 {
                    println!("  {} Usage: show <name>", "!".bright_red());
                    continue;
                }
                if let Some(device) = devices.get(parts[1]) {
                    show_device(device);
                } else {
                    println!("  {} Unknown device '{}'", "!".bright_red(), parts[1]);
                }
            }

            "list" | "ls" => {
                if devices.is_empty() {
                    println!("  {}", "(no devices)".dimmed());
                } else {
                    let mut names: Vec<_> = devices.keys().collect();
                    names.sort();
                    for name in names {
                        show_device(&devices[name]);
                    }
                }
            }

            "check" => {
                if parts.len() < 3 {
                    println!("  {} Usage: check <d1> <d2>", "!".bright_red());
                    continue;
                }
                let (n1, n2) = (parts[1], parts[2]);
                match (devices.get(n1), devices.get(n2)) {
                    (Some(d1), Some(d2)) => {
                        let map1 = d1.doc.to_map();
                        let map2 = d2.doc.to_map();
                        let mut all_keys: Vec<&String> = map1.keys().collect();
                        for k in map2.keys() {
                            if !all_keys.contains(&k) {
                                all_keys.push(k);
                            }
                        }
                        all_keys.sort();

                        let mut converged = true;
                        for key in &all_keys {
                            let v1 = map1.get(*key);
                            let v2 = map2.get(*key);
                            if v1 != v2 {
                                converged = false;
                                println!(
                                    "  {} '{}': {} has {:?}, {} has {:?}",
                                    "≠".bright_red(),
                                    key,
                                    n1,
                                    v1,
                                    n2,
                                    v2
                                );
                            } else if let Some(v) = v1 {
                                println!("  {} '{}': {}", "=".bright_green(), key, v);
                            }
                        }
                        convergence_result(converged);
                    }
                    _ => println!("  {} One or both devices not found", "!".bright_red()),
                }
            }

            "entry" | "e" => {
                if parts.len() < 3 {
                    println!("  {} Usage: entry <device> <key>", "!".bright_red());
                    continue;
                }
                if let Some(device) = devices.get(parts[1]) {
                    match device.doc.entry(parts[2]) {
                        Some(entry) if entry.is_tombstone() => {
                            println!(
                                "  {} '{}' deleted at t={} by client {}",
                                "⊘".bright_red(),
                                parts[2],
                                entry.timestamp,
                                entry.client_id
                            );
                        }
                        Some(entry) => {
                            println!(
                                "  {} '{}' = {} (t={}, client {})",
                                "▪".bright_white(),
                                parts[2],
                                entry.data.as_ref().map(|v| v.to_string()).unwrap_or_default(),
                                entry.timestamp,
                                entry.client_id
                            );
                        }
                        None => {
                            println!(
                                "  {} No entry for '{}' on '{}'",
                                "!".bright_yellow(),
                                parts[2],
                                parts[1]
                            );
                        }
                    }
                } else {
                    println!("  {} Unknown device '{}'", "!".bright_red(), parts[1]);
                }
            }

            "quit" | "exit" | "q" => {
                println!("  {}", "Goodbye!".dimmed());
                break;
            }

            "help" | "h" | "?" => {
                println!("  device <name> | set <d> <k> <v> | del <d> <k>");
                println!("  sync <from> <to> | syncall <d> | show <d> | list");
                println!("  check <d1> <d2> | entry <d> <k> | quit");
            }

            other => {
                println!(
                    "  {} Unknown command '{}' — type 'help'",
                    "?".bright_yellow(),
                    other
                );
            }
        }
    }
}

// ─── Entry point ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Demo => run_demo(),
        Commands::Conflict => run_conflict(),
        Commands::Partition => run_partition(),
        Commands::Interactive => run_interactive(),
    }
}
