use std::fs;
use std::path::Path;
use serde::Deserialize;

#[derive(Deserialize)]
struct Config {
    application: Application,
    gui: Gui,
    audio: Audio,
    generation: Generation,
}

#[derive(Deserialize)]
struct Application {
    name: String,
    version: String,
}

#[derive(Deserialize)]
struct Gui {
    local_port: u16,
    remote_port: u16,
    remote_ip: String,
    buffer_size: usize,
}

#[derive(Deserialize)]
struct Audio {
    sample_rate: u32,
    stream_format: String,
    backend: String,
    device: String,
    period_frames: usize,
    start_suspended: bool,
    auto_play: bool,
}

#[derive(Deserialize)]
struct Generation {
    api_base: String,
    analysis_model: String,
    tts_model: String,
    voice: String,
    temperature: f32,
    timeout_secs: u64,
    api_key_env: String,
}

// 在编译时读取 config.toml 并设置环境变量
fn main() {
    println!("cargo:rerun-if-changed=config.toml");

    let config_path = Path::new("config.toml");
    if !config_path.exists() {
        panic!("config.toml not found!");
    }

    let config_str = fs::read_to_string(config_path).expect("Failed to read config.toml");
    let config: Config = toml::from_str(&config_str).expect("Failed to parse config.toml");

    // 应用信息
    println!("cargo:rustc-env=APP_NAME={}", config.application.name);
    println!("cargo:rustc-env=APP_VERSION={}", config.application.version);

    // GUI 配置
    println!("cargo:rustc-env=GUI_LOCAL_PORT={}", config.gui.local_port);
    println!("cargo:rustc-env=GUI_REMOTE_PORT={}", config.gui.remote_port);
    println!("cargo:rustc-env=GUI_REMOTE_IP={}", config.gui.remote_ip);
    println!("cargo:rustc-env=GUI_BUFFER_SIZE={}", config.gui.buffer_size);

    // 音频配置
    println!("cargo:rustc-env=AUDIO_SAMPLE_RATE={}", config.audio.sample_rate);
    println!("cargo:rustc-env=AUDIO_STREAM_FORMAT={}", config.audio.stream_format);
    println!("cargo:rustc-env=AUDIO_BACKEND={}", config.audio.backend);
    println!("cargo:rustc-env=AUDIO_DEVICE={}", config.audio.device);
    println!("cargo:rustc-env=AUDIO_PERIOD_FRAMES={}", config.audio.period_frames);
    println!("cargo:rustc-env=AUDIO_START_SUSPENDED={}", config.audio.start_suspended);
    println!("cargo:rustc-env=AUDIO_AUTO_PLAY={}", config.audio.auto_play);

    // 生成服务配置
    println!("cargo:rustc-env=GEN_API_BASE={}", config.generation.api_base);
    println!("cargo:rustc-env=GEN_ANALYSIS_MODEL={}", config.generation.analysis_model);
    println!("cargo:rustc-env=GEN_TTS_MODEL={}", config.generation.tts_model);
    println!("cargo:rustc-env=GEN_VOICE={}", config.generation.voice);
    println!("cargo:rustc-env=GEN_TEMPERATURE={}", config.generation.temperature);
    println!("cargo:rustc-env=GEN_TIMEOUT_SECS={}", config.generation.timeout_secs);
    println!("cargo:rustc-env=GEN_API_KEY_ENV={}", config.generation.api_key_env);
}
