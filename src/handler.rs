use std::path::PathBuf;
use std::time::Instant;

use crate::app::App;
use crate::error::{AppError, Result};
use crate::nav::viewport::PointerButton;
use crate::session::types::{SortConfig, SortField, SortOrder};

pub const HELP: &str = "\
viewer:   next | prev | jump <path> | zoom in|out | wheel <dy>
          press <x> <y> [primary|secondary|middle|back|forward] | move <x> <y> | release
tabs:     open <path> | explorer | tab <key> | close [key] | status
explorer: page <n> | forward | back | first | last | sort <name|modified|created> <asc|desc>
          search [text] | cd <path> | transfer <path|none> | reset
          quit";

fn parse_f64(arg: Option<&str>, what: &str) -> Result<f64> {
    arg.and_then(|s| s.parse().ok())
        .ok_or_else(|| AppError::InvalidArgument(format!("expected a number for {what}")))
}

fn parse_button(arg: Option<&str>) -> Result<PointerButton> {
    match arg.unwrap_or("primary") {
        "primary" | "left" => Ok(PointerButton::Primary),
        "secondary" | "right" => Ok(PointerButton::Secondary),
        "middle" => Ok(PointerButton::Middle),
        "back" => Ok(PointerButton::Back),
        "forward" => Ok(PointerButton::Forward),
        other => Err(AppError::InvalidArgument(format!("unknown button {other}"))),
    }
}

fn require<'a>(arg: Option<&'a str>, what: &str) -> Result<&'a str> {
    arg.filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::InvalidArgument(format!("missing {what}")))
}

fn viewer_key(app: &App) -> Result<()> {
    match app.active_viewer() {
        Some(_) => Ok(()),
        None => Err(AppError::InvalidArgument("active tab is not a viewer".into())),
    }
}

fn explorer_key(app: &App) -> Result<String> {
    app.active_explorer_key()
        .ok_or_else(|| AppError::InvalidArgument("active tab is not an explorer".into()))
}

/// Handle one command line. Returns lines to print.
pub fn handle_command(app: &mut App, line: &str, now: Instant) -> Vec<String> {
    match dispatch(app, line.trim(), now) {
        Ok(lines) => lines,
        Err(e) => vec![format!("error: {e}")],
    }
}

fn dispatch(app: &mut App, line: &str, now: Instant) -> Result<Vec<String>> {
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    let mut args = rest.split_whitespace();

    match command {
        "" => {}
        "help" => return Ok(HELP.lines().map(str::to_string).collect()),
        "quit" | "exit" => app.quit(),
        "status" => return Ok(app.status_lines()),

        // Viewer
        "next" | "prev" | "jump" | "zoom" | "wheel" | "press" | "move" | "release" => {
            viewer_key(app)?;
            let parsed = match command {
                "press" => Some((
                    parse_f64(args.next(), "x")?,
                    parse_f64(args.next(), "y")?,
                    parse_button(args.next())?,
                )),
                _ => None,
            };
            let Some(viewer) = app.active_viewer_mut() else {
                return Ok(Vec::new());
            };
            match command {
                "next" => viewer.forward_at(now),
                "prev" => viewer.backward_at(now),
                "jump" => {
                    let target = require(Some(rest), "path")?;
                    if !viewer.jump_at(target, now) {
                        return Ok(vec![format!("not in this tab: {target}")]);
                    }
                }
                "zoom" => match args.next() {
                    Some("in") => viewer.zoom_in(),
                    Some("out") => viewer.zoom_out(),
                    _ => return Err(AppError::InvalidArgument("zoom in|out".into())),
                },
                "wheel" => viewer.wheel(parse_f64(args.next(), "dy")?),
                "press" => {
                    if let Some((x, y, button)) = parsed {
                        viewer.press_at(button, x, y, now);
                    }
                }
                "move" => {
                    let x = parse_f64(args.next(), "x")?;
                    let y = parse_f64(args.next(), "y")?;
                    viewer.pointer_moved(x, y);
                }
                _ => viewer.release(),
            }
        }

        // Tabs
        "open" => app.store().open_tab(PathBuf::from(require(Some(rest), "path")?))?,
        "explorer" => app.store().open_explorer()?,
        "tab" => {
            let key = require(args.next(), "tab key")?.to_string();
            app.store_mut().activate(&key)?;
        }
        "close" => {
            let key = match args.next() {
                Some(key) => key.to_string(),
                None => app
                    .store()
                    .active()
                    .map(str::to_string)
                    .ok_or_else(|| AppError::InvalidArgument("no active tab".into()))?,
            };
            app.store_mut().close(&key)?;
        }

        // Explorer
        "page" => {
            let key = explorer_key(app)?;
            let page = args
                .next()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| AppError::InvalidArgument("page <n>".into()))?;
            app.store_mut().change_page(&key, page)?;
        }
        "forward" => {
            let key = explorer_key(app)?;
            app.store_mut().move_forward(&key)?;
        }
        "back" => {
            let key = explorer_key(app)?;
            app.store_mut().move_backward(&key)?;
        }
        "first" => {
            let key = explorer_key(app)?;
            app.store_mut().move_to_start(&key)?;
        }
        "last" => {
            let key = explorer_key(app)?;
            app.store_mut().move_to_end(&key)?;
        }
        "sort" => {
            let key = explorer_key(app)?;
            let field = args.next().and_then(SortField::parse);
            let order = args.next().map_or(Some(SortOrder::default()), SortOrder::parse);
            let (Some(field), Some(order)) = (field, order) else {
                return Err(AppError::InvalidArgument(
                    "sort <name|modified|created> <asc|desc>".into(),
                ));
            };
            app.store_mut().change_sort(&key, SortConfig { field, order })?;
        }
        "search" => {
            let key = explorer_key(app)?;
            app.store_mut().input_search_at(&key, rest, now)?;
        }
        "cd" => {
            let key = explorer_key(app)?;
            let path = PathBuf::from(require(Some(rest), "path")?);
            app.store_mut().change_path(&key, path)?;
        }
        "transfer" => {
            let key = explorer_key(app)?;
            let target = match require(Some(rest), "path or none")? {
                "none" => None,
                path => Some(PathBuf::from(path)),
            };
            app.store_mut().change_transfer_target(&key, target)?;
        }
        "reset" => {
            let key = app
                .store()
                .active()
                .map(str::to_string)
                .ok_or_else(|| AppError::InvalidArgument("no active tab".into()))?;
            app.store_mut().reset(&key)?;
        }
        other => {
            return Err(AppError::InvalidArgument(format!(
                "unknown command {other}, try help"
            )))
        }
    }
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::event::EventHandler;
    use crate::fs::classifier::EntryClassifier;
    use crate::host::{HostRuntime, LocalHost};
    use crate::session::types::{SessionSnapshot, TabKind, TabSnapshot};
    use crate::sync::channel::SyncHub;
    use crate::sync::message::{Command, InboundEvent, Intent};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn setup_app() -> (App, UnboundedReceiver<Intent>, EventHandler) {
        let (hub, mut intents) = SyncHub::new();
        let host: Arc<dyn HostRuntime> = Arc::new(LocalHost::new(
            EntryClassifier::default(),
            None,
            Duration::ZERO,
        ));
        let events = EventHandler::new();
        let app = App::start("main", true, &hub, host, &AppConfig::default(), events.sender())
            .unwrap();
        intents.try_recv().unwrap();
        (app, intents, events)
    }

    fn with_explorer(app: &mut App) {
        let mut tab = TabSnapshot::placeholder("tab-1", TabKind::Explorer);
        tab.page_count = 4;
        app.handle_event(
            crate::event::Event::Sync(InboundEvent::SessionStateChanged(SessionSnapshot {
                active: Some("tab-1".into()),
                tabs: vec![tab],
            })),
            Instant::now(),
        );
    }

    #[tokio::test]
    async fn explorer_commands_publish_intents() {
        let (mut app, mut intents, _events) = setup_app();
        with_explorer(&mut app);
        let now = Instant::now();

        assert!(handle_command(&mut app, "page 3", now).is_empty());
        assert!(handle_command(&mut app, "sort name asc", now).is_empty());
        assert!(handle_command(&mut app, "transfer none", now).is_empty());
        handle_command(&mut app, "last", now);

        let commands: Vec<Command> = std::iter::from_fn(|| intents.try_recv().ok())
            .map(|i| i.command)
            .collect();
        assert_eq!(
            commands,
            vec![
                Command::ChangeTabPage {
                    key: "tab-1".into(),
                    page: 3
                },
                Command::ChangeTabSort {
                    key: "tab-1".into(),
                    sort: SortConfig {
                        field: SortField::Name,
                        order: SortOrder::Asc
                    }
                },
                Command::ChangeTabTransferTarget {
                    key: "tab-1".into(),
                    path: None
                },
                Command::MoveTabToEnd { key: "tab-1".into() },
            ]
        );
    }

    #[tokio::test]
    async fn search_waits_for_tick() {
        let (mut app, mut intents, _events) = setup_app();
        with_explorer(&mut app);
        let now = Instant::now();
        handle_command(&mut app, "search red cars", now);
        assert!(intents.try_recv().is_err());

        app.tick(now + Duration::from_secs(1));
        let intent = intents.try_recv().unwrap();
        assert_eq!(
            intent.command,
            Command::ChangeTabSearch {
                key: "tab-1".into(),
                query: Some("red cars".into())
            }
        );
    }

    #[tokio::test]
    async fn viewer_commands_need_a_viewer() {
        let (mut app, _intents, _events) = setup_app();
        with_explorer(&mut app);
        let out = handle_command(&mut app, "next", Instant::now());
        assert_eq!(out.len(), 1);
        assert!(out[0].starts_with("error:"));
    }

    #[tokio::test]
    async fn bad_arguments_are_reported() {
        let (mut app, mut intents, _events) = setup_app();
        with_explorer(&mut app);
        let now = Instant::now();
        for line in ["page x", "sort size", "cd", "frobnicate", "press 1"] {
            let out = handle_command(&mut app, line, now);
            assert!(out[0].starts_with("error:"), "{line} -> {out:?}");
        }
        assert!(intents.try_recv().is_err());
    }

    #[tokio::test]
    async fn quit_and_status() {
        let (mut app, _intents, _events) = setup_app();
        assert_eq!(handle_command(&mut app, "status", Instant::now()), vec!["no tabs"]);
        handle_command(&mut app, "quit", Instant::now());
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn open_and_close_publish() {
        let (mut app, mut intents, _events) = setup_app();
        with_explorer(&mut app);
        handle_command(&mut app, "open /pics/a b.png", Instant::now());
        handle_command(&mut app, "close", Instant::now());
        assert_eq!(
            intents.try_recv().unwrap().command,
            Command::OpenNewTab {
                path: PathBuf::from("/pics/a b.png")
            }
        );
        assert_eq!(
            intents.try_recv().unwrap().command,
            Command::CloseTab { key: "tab-1".into() }
        );
    }
}
