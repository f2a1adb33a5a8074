/// 运行时读取凭证时的备用环境变量名
const FALLBACK_API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Clone)]
pub struct Config {
    // 应用信息
    pub app_name: &'static str,
    pub app_version: &'static str,

    // GUI进程配置
    pub gui_local_port: u16,
    pub gui_remote_port: u16,
    pub gui_remote_ip: &'static str,
    pub gui_buffer_size: usize,

    // 音频配置
    pub audio_sample_rate: u32,
    pub audio_stream_format: &'static str,
    pub audio_backend: &'static str,
    pub audio_device: &'static str,
    pub audio_period_frames: usize,
    pub audio_start_suspended: bool,
    pub audio_auto_play: bool,

    // 生成服务配置（静态部分）
    pub gen_api_base: &'static str,
    pub gen_analysis_model: &'static str,
    pub gen_tts_model: &'static str,
    pub gen_voice: &'static str,
    pub gen_temperature: f32,
    pub gen_timeout_secs: u64,
    pub gen_api_key_env: &'static str,

    // 凭证（动态部分，运行时从环境变量读取，None 表示离线演示模式）
    pub api_key: Option<String>,
}

impl Config {
    /// 从编译时设置的环境变量创建配置
    /// 静态参数都在编译时从 config.toml 中读取，凭证在运行时读取
    pub fn new() -> Result<Self, &'static str> {
        let gen_api_key_env = env!("GEN_API_KEY_ENV");

        Ok(Self {
            app_name: env!("APP_NAME"),
            app_version: env!("APP_VERSION"),

            gui_local_port: env!("GUI_LOCAL_PORT").parse()
                .map_err(|_| "Failed to parse GUI_LOCAL_PORT")?,
            gui_remote_port: env!("GUI_REMOTE_PORT").parse()
                .map_err(|_| "Failed to parse GUI_REMOTE_PORT")?,
            gui_remote_ip: env!("GUI_REMOTE_IP"),
            gui_buffer_size: env!("GUI_BUFFER_SIZE").parse()
                .map_err(|_| "Failed to parse GUI_BUFFER_SIZE")?,

            audio_sample_rate: env!("AUDIO_SAMPLE_RATE").parse()
                .map_err(|_| "Failed to parse AUDIO_SAMPLE_RATE")?,
            audio_stream_format: env!("AUDIO_STREAM_FORMAT"),
            audio_backend: env!("AUDIO_BACKEND"),
            audio_device: env!("AUDIO_DEVICE"),
            audio_period_frames: env!("AUDIO_PERIOD_FRAMES").parse()
                .map_err(|_| "Failed to parse AUDIO_PERIOD_FRAMES")?,
            audio_start_suspended: env!("AUDIO_START_SUSPENDED").parse()
                .map_err(|_| "Failed to parse AUDIO_START_SUSPENDED")?,
            audio_auto_play: env!("AUDIO_AUTO_PLAY").parse()
                .map_err(|_| "Failed to parse AUDIO_AUTO_PLAY")?,

            gen_api_base: env!("GEN_API_BASE"),
            gen_analysis_model: env!("GEN_ANALYSIS_MODEL"),
            gen_tts_model: env!("GEN_TTS_MODEL"),
            gen_voice: env!("GEN_VOICE"),
            gen_temperature: env!("GEN_TEMPERATURE").parse()
                .map_err(|_| "Failed to parse GEN_TEMPERATURE")?,
            gen_timeout_secs: env!("GEN_TIMEOUT_SECS").parse()
                .map_err(|_| "Failed to parse GEN_TIMEOUT_SECS")?,
            gen_api_key_env,

            api_key: read_api_key(gen_api_key_env),
        })
    }

    /// 没有凭证时所有生成请求都走离线演示数据
    pub fn is_demo_mode(&self) -> bool {
        self.api_key.is_none()
    }
}

fn read_api_key(primary: &str) -> Option<String> {
    [primary, FALLBACK_API_KEY_ENV]
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}
