use crate::config::Config;
use crate::protocol::{UiCommand, UiUpdate};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

pub struct GuiBridge {
    socket: Arc<UdpSocket>,
    target_addr: String,
    buffer_size: usize,
    tx: mpsc::Sender<UiCommand>,
}

// GUI进程和Core进程通过本地UDP通信，端口在配置中指定
impl GuiBridge {
    pub async fn new(config: &Config, tx: mpsc::Sender<UiCommand>) -> anyhow::Result<Self> {
        // 绑定本地UDP端口
        let socket = UdpSocket::bind(format!("0.0.0.0:{}", config.gui_local_port)).await?;
        let target_addr = format!("{}:{}", config.gui_remote_ip, config.gui_remote_port);

        Ok(Self {
            socket: Arc::new(socket),
            target_addr,
            buffer_size: config.gui_buffer_size,
            tx,
        })
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        let mut buf = vec![0u8; self.buffer_size];
        loop {
            // 通过UDP socket接收指令
            let (len, _) = self.socket.recv_from(&mut buf).await?;
            if len == 0 {
                continue;
            }
            let Ok(msg) = std::str::from_utf8(&buf[..len]) else {
                log::warn!("Dropping non UTF-8 datagram from GUI");
                continue;
            };
            match serde_json::from_str::<UiCommand>(msg) {
                Ok(cmd) => {
                    if let Err(e) = self.tx.send(cmd).await {
                        log::error!("Failed to send GUI command: {}", e);
                        break;
                    }
                }
                Err(e) => log::warn!("Ignoring invalid GUI message {}: {}", msg, e),
            }
        }
        Ok(())
    }

    pub async fn send_update(&self, update: &UiUpdate) -> anyhow::Result<()> {
        self.socket
            .send_to(update.to_json().as_bytes(), &self.target_addr)
            .await?;
        Ok(())
    }
}
