use std::io::{Cursor, Read, Write};

use base64::prelude::*;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::common::types::UserId;

/// Where a track was resolved from. The core never talks to these services;
/// the kind only matters for policy and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Youtube,
    Soundcloud,
    Bandcamp,
    Vimeo,
    Twitch,
    Spotify,
    Local,
    HttpStream,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Youtube => "youtube",
            Self::Soundcloud => "soundcloud",
            Self::Bandcamp => "bandcamp",
            Self::Vimeo => "vimeo",
            Self::Twitch => "twitch",
            Self::Spotify => "spotify",
            Self::Local => "local",
            Self::HttpStream => "http_stream",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "youtube" => Some(Self::Youtube),
            "soundcloud" => Some(Self::Soundcloud),
            "bandcamp" => Some(Self::Bandcamp),
            "vimeo" => Some(Self::Vimeo),
            "twitch" => Some(Self::Twitch),
            "spotify" => Some(Self::Spotify),
            "local" => Some(Self::Local),
            "http_stream" => Some(Self::HttpStream),
            _ => None,
        }
    }
}

/// A single queued track. Immutable once enqueued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub uri: String,
    pub title: String,
    pub duration_ms: u64,
    pub requester: UserId,
    pub source: SourceKind,
    #[serde(default)]
    pub is_stream: bool,
}

impl Track {
    /// Encode the track into a base64 string.
    ///
    /// Binary format (version 1):
    ///   [u32 header: payload_size | (flags << 30)]
    ///     flags bit 0 = versioned (version byte present)
    ///   [u8  version = 1]
    ///   [utf title]
    ///   [utf uri]
    ///   [u64 duration ms]
    ///   [u64 requester id]
    ///   [utf source name]
    ///   [u8  is_stream: 0/1]
    pub fn encode(&self) -> String {
        let mut msg_buf = Vec::new();
        msg_buf.write_u8(1).unwrap();

        write_utf(&mut msg_buf, &self.title);
        write_utf(&mut msg_buf, &self.uri);
        msg_buf.write_u64::<BigEndian>(self.duration_ms).unwrap();
        msg_buf.write_u64::<BigEndian>(self.requester.0).unwrap();
        write_utf(&mut msg_buf, self.source.as_str());
        msg_buf.write_u8(if self.is_stream { 1 } else { 0 }).unwrap();

        // Header: low 30 bits = payload size, high 2 bits = flags.
        let mut final_buf = Vec::new();
        let size = msg_buf.len() as u32;
        let flags: u32 = 1;
        let header = size | (flags << 30);
        final_buf.write_u32::<BigEndian>(header).unwrap();
        final_buf.extend_from_slice(&msg_buf);

        BASE64_STANDARD.encode(&final_buf)
    }

    /// Decode a track from a base64 string. Returns `None` for corrupt data
    /// or unknown future versions.
    pub fn decode(encoded: &str) -> Option<Self> {
        let data = BASE64_STANDARD.decode(encoded).ok()?;
        if data.len() < 4 {
            return None;
        }

        let mut cursor = Cursor::new(data);
        let header = cursor.read_u32::<BigEndian>().ok()?;
        let flags = (header >> 30) & 0x03;

        let version = if (flags & 1) != 0 {
            cursor.read_u8().ok()?
        } else {
            1
        };

        if version > 1 {
            // Unknown future version.
            return None;
        }

        let title = read_utf(&mut cursor)?;
        let uri = read_utf(&mut cursor)?;
        let duration_ms = cursor.read_u64::<BigEndian>().ok()?;
        let requester = UserId(cursor.read_u64::<BigEndian>().ok()?);
        let source = SourceKind::from_str(&read_utf(&mut cursor)?)?;
        let is_stream = cursor.read_u8().ok()? != 0;

        Some(Self {
            uri,
            title,
            duration_ms,
            requester,
            source,
            is_stream,
        })
    }
}

fn write_utf(w: &mut Vec<u8>, s: &str) {
    let bytes = s.as_bytes();
    w.write_u16::<BigEndian>(bytes.len() as u16).unwrap();
    w.write_all(bytes).unwrap();
}

fn read_utf(cursor: &mut Cursor<Vec<u8>>) -> Option<String> {
    let len = cursor.read_u16::<BigEndian>().ok()? as usize;
    let mut buf = vec![0u8; len];
    cursor.read_exact(&mut buf).ok()?;
    String::from_utf8(buf).ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
