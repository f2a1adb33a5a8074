mod audio;
mod config;
mod console;
mod controller;
mod generation;
mod gui_bridge;
mod protocol;

use audio::{OutputContext, PlaybackController, PlaybackEvent, create_decoder};
use config::Config;
use console::ConsoleInput;
use controller::{GenerationEvent, SessionController};
use gui_bridge::GuiBridge;
use protocol::{UiCommand, UiUpdate};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{broadcast, mpsc};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    env_logger::init();

    // 加载配置
    let config = Config::new().map_err(anyhow::Error::msg)?;
    log::info!(
        "{} {} starting in {} mode",
        config.app_name,
        config.app_version,
        if config.is_demo_mode() { "offline demo" } else { "live" }
    );

    // 打开音频输出，失败时播放降级为空操作
    let context = match OutputContext::open(&config) {
        Ok(ctx) => Some(Arc::new(ctx)),
        Err(e) => {
            log::error!("{}; playback disabled", e);
            None
        }
    };

    // 创建通道，用于组件间通信
    let (tx_ui_cmd, mut rx_ui_cmd) = mpsc::channel::<UiCommand>(100);
    let (tx_ui_update, mut rx_ui_update) = mpsc::channel::<UiUpdate>(100);
    let (tx_console, mut rx_console) = mpsc::channel::<ConsoleInput>(100);
    let (tx_gen_event, mut rx_gen_event) = mpsc::channel::<GenerationEvent>(100);
    let (tx_playback_event, mut rx_playback_event) = mpsc::channel::<PlaybackEvent>(100);

    // 启动GUI桥，与前端进程通信
    let gui_bridge = Arc::new(GuiBridge::new(&config, tx_ui_cmd).await?);
    let gui_bridge_clone = gui_bridge.clone();
    tokio::spawn(async move {
        if let Err(e) = gui_bridge_clone.run().await {
            log::error!("GuiBridge error: {}", e);
        }
    });

    // 状态更新单独转发，主循环不会因为发送阻塞
    tokio::spawn(async move {
        while let Some(update) = rx_ui_update.recv().await {
            log::debug!("UI update: {}", update.to_json());
            if let Err(e) = gui_bridge.send_update(&update).await {
                log::warn!("Failed to send to GUI: {}", e);
            }
        }
    });

    tokio::spawn(async move {
        if let Err(e) = console::run(tx_console).await {
            log::error!("Console error: {}", e);
        }
    });

    let playback = PlaybackController::new(context.clone(), tx_playback_event);
    spawn_observers(&playback, context.as_ref(), tx_ui_update.clone());

    let service = generation::create_service(&config)?;
    let decoder = create_decoder(config.audio_stream_format, config.audio_sample_rate)?;
    let mut controller = SessionController::new(
        service,
        decoder,
        playback,
        config.audio_auto_play,
        tx_gen_event,
        tx_ui_update,
    );

    log::info!("Core started, waiting for commands");

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                log::info!("Received Ctrl+C, shutting down...");
                break;
            }

            Some(cmd) = rx_ui_cmd.recv() => {
                log::info!("Received command from GUI: {:?}", cmd);
                controller.handle_ui_command(cmd).await;
            }

            // stdin 关闭后该分支自动失效
            Some(input) = rx_console.recv() => {
                match input {
                    ConsoleInput::Command(cmd) => controller.handle_ui_command(cmd).await,
                    ConsoleInput::Quit => {
                        log::info!("Quit requested from console");
                        break;
                    }
                }
            }

            Some(event) = rx_gen_event.recv() => {
                controller.handle_generation_event(event).await;
            }

            Some(event) = rx_playback_event.recv() => {
                controller.handle_playback_event(event);
            }
        }
    }

    // 先停止播放，再释放设备
    drop(controller);
    if let Some(ctx) = &context {
        ctx.close().await;
    }
    Ok(())
}

/// Forward playback and output state changes to the front-end.
fn spawn_observers(
    playback: &PlaybackController,
    context: Option<&Arc<OutputContext>>,
    tx: mpsc::Sender<UiUpdate>,
) {
    let mut states = playback.subscribe_state();
    let state_tx = tx.clone();
    tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = *states.borrow_and_update();
            if state_tx.send(UiUpdate::Playback { state }).await.is_err() {
                break;
            }
        }
    });

    let mut completions = playback.subscribe_completions();
    let finished_tx = tx.clone();
    tokio::spawn(async move {
        loop {
            match completions.recv().await {
                Ok(_) => {
                    if finished_tx.send(UiUpdate::Finished).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    log::warn!("Missed {} completion notifications", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    if let Some(ctx) = context {
        let mut output_states = ctx.subscribe();
        tokio::spawn(async move {
            while output_states.changed().await.is_ok() {
                let state = *output_states.borrow_and_update();
                if tx.send(UiUpdate::Output { state }).await.is_err() {
                    break;
                }
            }
        });
    }
}
