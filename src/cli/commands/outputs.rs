use crate::{
    cli::{
        CliError, CommandResult,
        formatting::{format_equalizer, format_header, format_output, format_selected},
    },
    config::Settings,
    services::audio::{DeviceProbe, OutputRegistry},
};

/// Lists local outputs, marking the saved one, followed by the equalizer
/// settings.
///
/// # Errors
/// Returns error if the devices cannot be enumerated.
pub fn execute<P: DeviceProbe>(registry: &OutputRegistry<P>, settings: &Settings) -> CommandResult {
    let preferred = settings.output_local_output_id.as_deref();
    let outputs = registry.refresh().map_err(|err| CliError::ServiceError {
        service: "Audio".to_string(),
        details: err.to_string(),
    })?;

    if outputs.is_empty() {
        return Ok("No local audio outputs found".to_string());
    }

    let mut output = format_header("Local outputs:");
    output.push('\n');
    for device in &outputs {
        let marker = if preferred == Some(device.id.as_str()) {
            format_selected("*")
        } else {
            " ".to_string()
        };
        output.push_str(&format!("{marker} {}\n", format_output(device)));
    }
    output.push('\n');
    output.push_str(&format_equalizer(
        settings.eq_enabled,
        settings.eq_selected_preset.as_deref(),
    ));

    Ok(output.trim_end().to_string())
}
