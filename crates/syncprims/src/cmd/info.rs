use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use syncprims_dlp::{EndStatus, StorageInfo, SysInfo, UserInfo};
use syncprims_session::{Session, SessionConfig};
use syncprims_transport::{ByteStream, Endpoint, SyncStream};
use tracing::{debug, info};

use crate::cmd::{parse_duration, InfoArgs};
use crate::exit::{
    dlp_error, session_error, transport_error, CliError, CliResult, DATA_INVALID, INTERNAL,
    INTERRUPTED, SUCCESS,
};
use crate::output::{print_json, table, text_preview, OutputFormat};

#[derive(Serialize)]
struct CardOutput {
    card_no: u8,
    name: String,
    manufacturer: String,
    rom_size: u32,
    ram_size: u32,
    free_ram: u32,
}

#[derive(Serialize)]
struct UserOutput {
    name: String,
    user_id: u32,
    last_sync_pc: String,
    last_sync: String,
    last_successful_sync: String,
}

#[derive(Serialize)]
struct InfoOutput {
    endpoint: String,
    device_version: String,
    device_max_baud: u32,
    negotiated_baud: Option<u32>,
    rom_version: String,
    locale: u32,
    product_id: String,
    device_time: String,
    user: Option<UserOutput>,
    cards: Option<Vec<CardOutput>>,
    packets_discarded: u64,
}

pub fn run(args: InfoArgs, format: OutputFormat) -> CliResult<i32> {
    let endpoint: Endpoint = args
        .endpoint
        .parse()
        .map_err(|err| transport_error("invalid endpoint", err))?;
    let config = session_config(&args)?;

    let stream = endpoint
        .connect()
        .map_err(|err| transport_error("connect failed", err))?;
    let interrupted = Arc::new(AtomicBool::new(false));
    install_ctrlc_handler(&stream, Arc::clone(&interrupted))?;

    info!(%endpoint, "waiting for device; press the HotSync button");
    let session = match Session::establish(stream, &config) {
        Ok(session) => session,
        Err(_) if interrupted.load(Ordering::SeqCst) => {
            return Err(CliError::new(INTERRUPTED, "interrupted"));
        }
        Err(err) => return Err(session_error("handshake failed", err)),
    };

    let result = gather(&session, &args);
    let result = match result {
        Err(_) if interrupted.load(Ordering::SeqCst) => {
            Err(CliError::new(INTERRUPTED, "interrupted"))
        }
        other => other,
    };
    let (sys, time, user, storage) = result?;

    let outcome = session.outcome();
    let out = InfoOutput {
        endpoint: endpoint.to_string(),
        device_version: format!("{}.{}", outcome.device_version.0, outcome.device_version.1),
        device_max_baud: outcome.device_max_baud,
        negotiated_baud: outcome.negotiated_baud,
        rom_version: rom_version(sys.rom_version),
        locale: sys.locale,
        product_id: text_preview(&sys.product_id),
        device_time: time,
        user: user.map(|user| UserOutput {
            name: user.name,
            user_id: user.user_id,
            last_sync_pc: format!("{:#010x}", user.last_sync_pc),
            last_sync: user.last_sync.to_string(),
            last_successful_sync: user.last_successful_sync.to_string(),
        }),
        cards: storage.map(|storage| {
            storage
                .cards
                .into_iter()
                .map(|card| CardOutput {
                    card_no: card.card_no,
                    name: card.name,
                    manufacturer: card.manufacturer,
                    rom_size: card.rom_size,
                    ram_size: card.ram_size,
                    free_ram: card.free_ram,
                })
                .collect()
        }),
        packets_discarded: session.stats().discarded,
    };
    session.close();

    print_info(&out, format);
    Ok(SUCCESS)
}

type Gathered = (SysInfo, String, Option<UserInfo>, Option<StorageInfo>);

fn gather(session: &Session, args: &InfoArgs) -> CliResult<Gathered> {
    let dlp = session.dlp();
    let sys = dlp
        .read_sys_info()
        .map_err(|err| dlp_error("ReadSysInfo", err))?;
    let time = dlp
        .get_sys_date_time()
        .map_err(|err| dlp_error("GetSysDateTime", err))?
        .to_string();
    let user = if args.user {
        Some(
            dlp.read_user_info()
                .map_err(|err| dlp_error("ReadUserInfo", err))?,
        )
    } else {
        None
    };
    let storage = if args.storage {
        Some(read_all_cards(session)?)
    } else {
        None
    };
    if let Some(text) = &args.log {
        dlp.add_sync_log_entry(text)
            .map_err(|err| dlp_error("AddSyncLogEntry", err))?;
    }
    dlp.end_of_sync(EndStatus::Normal)
        .map_err(|err| dlp_error("EndOfSync", err))?;
    Ok((sys, time, user, storage))
}

/// Follow the `more` flag until every card has been listed.
fn read_all_cards(session: &Session) -> CliResult<StorageInfo> {
    let mut storage = session
        .dlp()
        .read_storage_info(0)
        .map_err(|err| dlp_error("ReadStorageInfo", err))?;
    while storage.more {
        let next_card = storage.last_card.saturating_add(1);
        let next = session
            .dlp()
            .read_storage_info(next_card)
            .map_err(|err| dlp_error("ReadStorageInfo", err))?;
        debug!(first = next_card, cards = next.cards.len(), "more cards");
        if next.cards.is_empty() {
            break;
        }
        storage.cards.extend(next.cards);
        storage.last_card = next.last_card;
        storage.more = next.more;
    }
    Ok(storage)
}

fn session_config(args: &InfoArgs) -> CliResult<SessionConfig> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => SessionConfig::default(),
    };
    if let Some(baud) = args.baud {
        config.baud_rate = Some(baud);
    }
    if let Some(timeout) = &args.wakeup_timeout {
        let timeout = parse_duration(timeout)?;
        config.wakeup_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
    }
    Ok(config)
}

fn load_config(path: &Path) -> CliResult<SessionConfig> {
    let text = std::fs::read_to_string(path).map_err(|err| {
        crate::exit::io_error(&format!("cannot read config {}", path.display()), err)
    })?;
    serde_json::from_str(&text).map_err(|err| {
        CliError::new(
            DATA_INVALID,
            format!("invalid config {}: {err}", path.display()),
        )
    })
}

/// Shut the link down on Ctrl-C so a blocked wait returns at once.
fn install_ctrlc_handler(stream: &SyncStream, interrupted: Arc<AtomicBool>) -> CliResult<()> {
    let link = stream
        .try_clone()
        .map_err(|err| transport_error("cannot clone link", err))?;
    ctrlc::set_handler(move || {
        interrupted.store(true, Ordering::SeqCst);
        let _ = link.shutdown();
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

/// `0xMMmmfsbb` as `M.m.f`, with the stage letter and build when not a release.
fn rom_version(raw: u32) -> String {
    let [major, minor_fix, stage, build] = raw.to_be_bytes();
    let major = (major >> 4) * 10 + (major & 0x0F);
    let minor = minor_fix >> 4;
    let fix = minor_fix & 0x0F;
    let stage = match stage >> 4 {
        0 => "d",
        1 => "a",
        2 => "b",
        _ => "",
    };
    if stage.is_empty() {
        format!("{major}.{minor}.{fix}")
    } else {
        format!("{major}.{minor}.{fix}{stage}{build}")
    }
}

fn print_info(out: &InfoOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut device = table(vec!["FIELD", "VALUE"]);
            device
                .add_row(vec!["endpoint", out.endpoint.as_str()])
                .add_row(vec!["protocol", out.device_version.as_str()])
                .add_row(vec!["rom", out.rom_version.as_str()])
                .add_row(vec!["product", out.product_id.as_str()])
                .add_row(vec!["device time", out.device_time.as_str()]);
            device.add_row(vec![
                "baud".to_string(),
                baud_text(out.negotiated_baud, out.device_max_baud),
            ]);
            if let Some(user) = &out.user {
                device
                    .add_row(vec!["user", user.name.as_str()])
                    .add_row(vec!["last sync", user.last_sync.as_str()]);
            }
            println!("{device}");

            if let Some(cards) = &out.cards {
                let mut listing = table(vec!["CARD", "NAME", "MAKER", "ROM", "RAM", "FREE"]);
                for card in cards {
                    listing.add_row(vec![
                        card.card_no.to_string(),
                        card.name.clone(),
                        card.manufacturer.clone(),
                        card.rom_size.to_string(),
                        card.ram_size.to_string(),
                        card.free_ram.to_string(),
                    ]);
                }
                println!("{listing}");
            }
        }
        OutputFormat::Pretty => {
            println!("Device:");
            println!("  Endpoint:     {}", out.endpoint);
            println!("  Protocol:     {}", out.device_version);
            println!("  ROM:          {}", out.rom_version);
            println!("  Product:      {}", out.product_id);
            println!("  Locale:       {:#010x}", out.locale);
            println!("  Time:         {}", out.device_time);
            println!(
                "  Baud:         {}",
                baud_text(out.negotiated_baud, out.device_max_baud)
            );
            if let Some(user) = &out.user {
                println!("  User:         {} ({})", user.name, user.user_id);
                println!("  Last sync:    {}", user.last_sync);
            }
            if let Some(cards) = &out.cards {
                for card in cards {
                    println!(
                        "  Card {}:       {} / {} ({} of {} bytes free)",
                        card.card_no, card.name, card.manufacturer, card.free_ram, card.ram_size
                    );
                }
            }
        }
        OutputFormat::Raw => println!("{}", out.product_id),
    }
}

fn baud_text(negotiated: Option<u32>, max: u32) -> String {
    match negotiated {
        Some(rate) => format!("{rate} (device max {max})"),
        None => format!("unchanged (device max {max})"),
    }
}
