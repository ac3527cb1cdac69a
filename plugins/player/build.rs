const COMMANDS: &[&str] = &[
    "enqueue_samples",
    "enqueue_pcm16",
    "enqueue_base64",
    "stop_playback",
    "get_playback_status",
    "list_output_devices",
];

fn main() {
    tauri_plugin::Builder::new(COMMANDS).build();
}
