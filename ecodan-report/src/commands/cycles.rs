use anyhow::{bail, Result};
use ecodan_common::model::{Channel, ChannelKind};
use ecodan_common::segment::segment;

use super::ReportContext;
use crate::render;

/// Parse a binary channel by its column name
pub fn parse_binary_channel(raw: &str) -> Result<Channel> {
    match Channel::from_column(raw) {
        Some(c) if c.kind() == ChannelKind::BinaryState => Ok(c),
        Some(c) => bail!("{} is not a binary channel", c),
        None => bail!("unknown channel '{}'", raw),
    }
}

pub fn run(ctx: &ReportContext, channel: &str, active_only: bool) -> Result<()> {
    let channel = parse_binary_channel(channel)?;
    let stream = ctx.load_stream()?;

    let mut segments = segment(stream.as_slice(), channel);
    if active_only {
        segments.retain(|s| s.active);
    }
    if segments.is_empty() {
        println!("No data found.");
        return Ok(());
    }
    print!("{}", render::cycles_table(channel, &segments));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_binary_channel() {
        assert_eq!(parse_binary_channel("compressor_on").unwrap(), Channel::CompressorOn);
        assert_eq!(parse_binary_channel("3way_valve_dhw").unwrap(), Channel::DhwValve);
        assert!(parse_binary_channel("feed_temp").is_err());
        assert!(parse_binary_channel("nope").is_err());
    }
}
