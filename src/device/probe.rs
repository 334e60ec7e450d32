//! Device Probe (C2): a pure parser over externally supplied probe-tool text.
//!
//! No ioctl, no `v4l` involvement here — device enumeration at the OS level is
//! out of scope; this module only turns `--info`/`--list-formats-ext`/
//! `--list-frameintervals`-shaped text into a [`CapabilityRecord`].

use std::path::Path;

use super::types::{CapabilityRecord, FormatRecord};

/// What probing commands to run against a device path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeCommand {
    Info,
    ListFormatsExt,
    ListFrameIntervals,
}

/// Runs the external probe commands. Implementations shell out to whatever
/// CLI tool exists on the host; this crate never calls it directly.
///
/// Returns `Err` with a human-readable reason when the command could not be
/// run or exited non-zero, so a probe failure can surface as a genuine
/// `DeviceStatus::Error` transition instead of being swallowed as empty text.
pub trait DeviceCommandExecutor {
    fn exec(&self, path: &Path, command: ProbeCommand) -> Result<String, String>;
}

/// Parse the combined probe output for a device into a [`CapabilityRecord`].
///
/// `exists` and `path` are accepted for symmetry with the Device Monitor's
/// calling convention (it checks existence before invoking the probe); this
/// function itself is pure over the text `exec` returns. Any failing probe
/// command fails the whole probe — a half-populated capability record would
/// misrepresent the device.
pub fn probe_device(
    exists: &dyn Fn(&Path) -> bool,
    exec: &dyn DeviceCommandExecutor,
    path: &Path,
) -> Result<CapabilityRecord, String> {
    if !exists(path) {
        return Ok(CapabilityRecord::default());
    }

    let info = exec.exec(path, ProbeCommand::Info)?;
    let formats_ext = exec.exec(path, ProbeCommand::ListFormatsExt)?;
    let frame_intervals = exec.exec(path, ProbeCommand::ListFrameIntervals)?;

    let mut record = parse_info(&info);
    record.formats = parse_formats(&formats_ext, &frame_intervals);
    Ok(record)
}

/// Parse `key: value` lines into driver/card/bus/driver_version, falling
/// back to documented defaults when a key is absent.
fn parse_info(text: &str) -> CapabilityRecord {
    let mut record = CapabilityRecord::default();
    for line in text.lines() {
        let Some((key, value)) = split_key_value(line) else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match key.to_ascii_lowercase().as_str() {
            "driver name" | "driver" => record.driver = value.to_string(),
            "card type" | "card" => record.card = value.to_string(),
            "bus info" | "bus" => record.bus = value.to_string(),
            "driver version" => record.driver_version = value.to_string(),
            _ => {}
        }
    }
    record
}

fn split_key_value(line: &str) -> Option<(&str, &str)> {
    let idx = line.find(':')?;
    Some((line[..idx].trim(), &line[idx + 1..]))
}

/// Split format-listing text into `Index :`-delimited blocks and parse each
/// into a [`FormatRecord`], pulling matching frame-rate lines from the
/// separate `--list-frameintervals` output by pixel format and size.
fn parse_formats(formats_ext: &str, frame_intervals: &str) -> Vec<FormatRecord> {
    let blocks = split_index_blocks(formats_ext);
    let mut records = Vec::new();
    for block in blocks {
        let pixel_format = extract_pixel_format(&block);
        let (width, height) = extract_size(&block);
        let mut frame_rates = extract_frame_rates(&block);
        frame_rates.extend(extract_frame_rates(frame_intervals));
        dedup_preserve_order(&mut frame_rates);
        records.push(FormatRecord {
            pixel_format,
            width,
            height,
            frame_rates,
        });
    }
    records
}

fn split_index_blocks(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current = String::new();
    let mut started = false;
    for line in text.lines() {
        if line.trim_start().starts_with("Index") && line.contains(':') {
            if started {
                blocks.push(std::mem::take(&mut current));
            }
            started = true;
        }
        if started {
            current.push_str(line);
            current.push('\n');
        }
    }
    if started {
        blocks.push(current);
    }
    blocks
}

fn extract_pixel_format(block: &str) -> String {
    for line in block.lines() {
        if let Some((key, value)) = split_key_value(line) {
            if key.to_ascii_lowercase().contains("pixel format") {
                let value = value.trim();
                // Value often looks like "'MJPG' (Motion-JPEG)"; keep the quoted code.
                if let Some(start) = value.find('\'') {
                    if let Some(end) = value[start + 1..].find('\'') {
                        return value[start + 1..start + 1 + end].to_string();
                    }
                }
                return value.to_string();
            }
        }
    }
    String::new()
}

/// Strict `<uint>x<uint>` size parse; any failure keeps the record but
/// zeroes both dimensions.
fn extract_size(block: &str) -> (u32, u32) {
    for line in block.lines() {
        if !line.to_ascii_lowercase().contains("size") {
            continue;
        }
        if let Some((w, h)) = parse_wxh_anywhere(line) {
            return (w, h);
        }
    }
    (0, 0)
}

fn parse_wxh_anywhere(line: &str) -> Option<(u32, u32)> {
    let bytes: Vec<char> = line.chars().collect();
    for i in 0..bytes.len() {
        if let Some((w, h, _)) = try_parse_wxh_at(&bytes, i) {
            return Some((w, h));
        }
    }
    None
}

/// Try to parse a `<uint>x<uint>` token starting at byte index `start`;
/// returns the parsed pair and the index just past it.
fn try_parse_wxh_at(chars: &[char], start: usize) -> Option<(u32, u32, usize)> {
    let mut i = start;
    let digits_start = i;
    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    if i == digits_start {
        return None;
    }
    let w: u32 = chars[digits_start..i].iter().collect::<String>().parse().ok()?;
    if i >= chars.len() || (chars[i] != 'x' && chars[i] != 'X') {
        return None;
    }
    i += 1;
    let h_start = i;
    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    if i == h_start {
        return None;
    }
    let h: u32 = chars[h_start..i].iter().collect::<String>().parse().ok()?;
    Some((w, h, i))
}

/// Scan `text` line by line for the first matching frame-rate pattern, in
/// the documented priority order, collecting one match per line.
fn extract_frame_rates(text: &str) -> Vec<String> {
    let mut rates = Vec::new();
    for line in text.lines() {
        if let Some(rate) = first_frame_rate_match(line) {
            rates.push(rate);
        }
    }
    rates
}

fn first_frame_rate_match(line: &str) -> Option<String> {
    if let Some(v) = match_suffix_number(line, &["fps", "FPS"]) {
        return Some(v);
    }
    if let Some(v) = match_suffix_number(line, &["Hz"]) {
        return Some(v);
    }
    if let Some(v) = match_size_at_rate(line) {
        return Some(v);
    }
    if let Some(v) = match_bracketed_fraction(line) {
        return Some(v);
    }
    if let Some(v) = match_fraction_seconds(line) {
        return Some(v);
    }
    if let Some(v) = match_frames_per_second_words(line) {
        return Some(v);
    }
    if let Some(v) = match_labelled_number(line, "rate:") {
        return Some(v);
    }
    if let Some(v) = match_labelled_number(line, "fps:") {
        return Some(v);
    }
    None
}

/// `<f> fps` / `<f> FPS` / `<f> Hz`
fn match_suffix_number(line: &str, suffixes: &[&str]) -> Option<String> {
    for suffix in suffixes {
        if let Some(pos) = line.find(suffix) {
            let before = &line[..pos];
            if let Some(number) = trailing_number(before) {
                return Some(format!("{number} {suffix}"));
            }
        }
    }
    None
}

/// `<uint>x<uint>@<f>`
fn match_size_at_rate(line: &str) -> Option<String> {
    let at = line.find('@')?;
    let before = &line[..at];
    let (w, h, _) = {
        let chars: Vec<char> = before.chars().collect();
        (0..chars.len()).find_map(|i| try_parse_wxh_at(&chars, i))?
    };
    let after = &line[at + 1..];
    let number = leading_number(after)?;
    Some(format!("{w}x{h}@{number}"))
}

/// `[<n>/<d>]`
fn match_bracketed_fraction(line: &str) -> Option<String> {
    let start = line.find('[')?;
    let end = line[start..].find(']')? + start;
    let inner = &line[start + 1..end];
    let slash = inner.find('/')?;
    let n = inner[..slash].trim();
    let d = inner[slash + 1..].trim();
    if n.parse::<u64>().is_ok() && d.parse::<u64>().is_ok() {
        Some(format!("[{n}/{d}]"))
    } else {
        None
    }
}

/// `<n>/<d> s`
fn match_fraction_seconds(line: &str) -> Option<String> {
    let s_pos = line.find(" s")?;
    let before = &line[..s_pos];
    let before = before.trim_end();
    let slash = before.rfind('/')?;
    let n_start = before[..slash]
        .rfind(|c: char| !c.is_ascii_digit())
        .map(|i| i + 1)
        .unwrap_or(0);
    let n = &before[n_start..slash];
    let d = &before[slash + 1..];
    if n.parse::<u64>().is_ok() && d.parse::<u64>().is_ok() {
        Some(format!("{n}/{d} s"))
    } else {
        None
    }
}

/// `<uint> frames per second`
fn match_frames_per_second_words(line: &str) -> Option<String> {
    let pos = line.find("frames per second")?;
    let before = &line[..pos];
    let number = trailing_number(before)?;
    Some(format!("{number} frames per second"))
}

/// `rate: <f>` / `fps: <f>`
fn match_labelled_number(line: &str, label: &str) -> Option<String> {
    let lower = line.to_ascii_lowercase();
    let pos = lower.find(label)?;
    let after = &line[pos + label.len()..];
    let number = leading_number(after)?;
    Some(format!("{} {number}", label.trim_end_matches(':')))
}

fn trailing_number(s: &str) -> Option<String> {
    let s = s.trim_end();
    let end = s.len();
    let start = s
        .rfind(|c: char| !(c.is_ascii_digit() || c == '.'))
        .map(|i| i + 1)
        .unwrap_or(0);
    let candidate = &s[start..end];
    if candidate.is_empty() || candidate.parse::<f64>().is_err() {
        None
    } else {
        Some(candidate.to_string())
    }
}

fn leading_number(s: &str) -> Option<String> {
    let s = s.trim_start();
    let end = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    let candidate = &s[..end];
    if candidate.is_empty() || candidate.parse::<f64>().is_err() {
        None
    } else {
        Some(candidate.to_string())
    }
}

fn dedup_preserve_order(rates: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    rates.retain(|r| seen.insert(r.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeExecutor {
        info: &'static str,
        formats: &'static str,
        intervals: &'static str,
    }

    impl DeviceCommandExecutor for FakeExecutor {
        fn exec(&self, _path: &Path, command: ProbeCommand) -> Result<String, String> {
            Ok(match command {
                ProbeCommand::Info => self.info.to_string(),
                ProbeCommand::ListFormatsExt => self.formats.to_string(),
                ProbeCommand::ListFrameIntervals => self.intervals.to_string(),
            })
        }
    }

    struct FailingExecutor;
    impl DeviceCommandExecutor for FailingExecutor {
        fn exec(&self, _path: &Path, _command: ProbeCommand) -> Result<String, String> {
            Err("device busy".to_string())
        }
    }

    #[test]
    fn missing_device_returns_default_capabilities() {
        let record = probe_device(&|_| false, &FakeExecutor { info: "", formats: "", intervals: "" }, Path::new("/dev/video0")).unwrap();
        assert_eq!(record, CapabilityRecord::default());
    }

    #[test]
    fn failing_probe_command_fails_the_whole_probe() {
        let err = probe_device(&|_| true, &FailingExecutor, Path::new("/dev/video0")).unwrap_err();
        assert_eq!(err, "device busy");
    }

    #[test]
    fn parses_driver_and_card_with_defaults_on_missing_keys() {
        let exec = FakeExecutor {
            info: "Driver name : uvcvideo\nBus info : usb-0000:00:14.0-1\n",
            formats: "",
            intervals: "",
        };
        let record = probe_device(&|_| true, &exec, Path::new("/dev/video0")).unwrap();
        assert_eq!(record.driver, "uvcvideo");
        assert_eq!(record.card, "Unknown Video Device");
        assert_eq!(record.bus, "usb-0000:00:14.0-1");
    }

    #[test]
    fn parses_format_blocks_with_size_and_frame_rates() {
        let exec = FakeExecutor {
            info: "",
            formats: "Index : 0\n\tPixel Format: 'MJPG' (Motion-JPEG)\n\tSize: Discrete 1920x1080\n\t\tInterval: Discrete 0.033s (30.000 fps)\n",
            intervals: "",
        };
        let record = probe_device(&|_| true, &exec, Path::new("/dev/video0")).unwrap();
        assert_eq!(record.formats.len(), 1);
        let fmt = &record.formats[0];
        assert_eq!(fmt.pixel_format, "MJPG");
        assert_eq!(fmt.width, 1920);
        assert_eq!(fmt.height, 1080);
        assert!(fmt.frame_rates.iter().any(|r| r.contains("30")));
    }

    #[test]
    fn unparseable_size_defaults_to_zero_but_keeps_record() {
        let exec = FakeExecutor {
            info: "",
            formats: "Index : 0\n\tPixel Format: 'YUYV'\n\tSize: garbage\n",
            intervals: "",
        };
        let record = probe_device(&|_| true, &exec, Path::new("/dev/video0")).unwrap();
        assert_eq!(record.formats.len(), 1);
        assert_eq!(record.formats[0].width, 0);
        assert_eq!(record.formats[0].height, 0);
    }

    #[test]
    fn frame_rate_dedup_preserves_first_seen_order() {
        let exec = FakeExecutor {
            info: "",
            formats: "Index : 0\n\tPixel Format: 'MJPG'\n\tSize: Discrete 640x480\n\t\tInterval: Discrete (30.000 fps)\n\t\tInterval: Discrete (30.000 fps)\n\t\tInterval: Discrete (15.000 fps)\n",
            intervals: "",
        };
        let record = probe_device(&|_| true, &exec, Path::new("/dev/video0")).unwrap();
        assert_eq!(record.formats[0].frame_rates, vec!["30.000 fps", "15.000 fps"]);
    }
}
