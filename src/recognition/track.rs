use crate::models::{Provider, RecognizedTrack, StreamingLink};
use serde::Deserialize;

const SPOTIFY_TRACK_URI: &str = "spotify:track:";
const SPOTIFY_TRACK_URL: &str = "https://open.spotify.com/track/";

/// Track object of a recognition match
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShazamTrack {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub images: Option<TrackImages>,
    #[serde(default)]
    pub hub: Option<Hub>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrackImages {
    #[serde(default)]
    pub coverarthq: Option<String>,
    #[serde(default)]
    pub coverart: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Hub {
    #[serde(default)]
    pub providers: Vec<HubProvider>,
    #[serde(default)]
    pub options: Vec<HubOption>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HubProvider {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub actions: Vec<HubAction>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HubOption {
    #[serde(default)]
    pub providername: String,
    #[serde(default)]
    pub actions: Vec<HubAction>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HubAction {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub uri: String,
}

/// Rewrite a `spotify:track:<id>` deep link into its web URL
pub fn spotify_track_url(uri: &str) -> Option<String> {
    uri.strip_prefix(SPOTIFY_TRACK_URI)
        .filter(|id| !id.is_empty())
        .map(|id| format!("{}{}", SPOTIFY_TRACK_URL, id))
}

impl Hub {
    /// First link the hub advertises for `provider`
    pub fn resolve(&self, provider: Provider) -> Option<String> {
        match provider {
            Provider::Spotify => self
                .providers
                .iter()
                .filter(|p| p.kind == "SPOTIFY")
                .flat_map(|p| &p.actions)
                .filter(|a| a.kind == "uri")
                .find_map(|a| spotify_track_url(&a.uri)),
            Provider::AppleMusic => self
                .options
                .iter()
                .filter(|o| o.providername == "applemusic")
                .flat_map(|o| &o.actions)
                .find(|a| a.kind == "applemusicopen" && !a.uri.is_empty())
                .map(|a| a.uri.clone()),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_deref().filter(|s| !s.is_empty()).map(String::from)
}

impl From<ShazamTrack> for RecognizedTrack {
    fn from(track: ShazamTrack) -> Self {
        let cover_url = track
            .images
            .as_ref()
            .and_then(|i| non_empty(&i.coverarthq).or_else(|| non_empty(&i.coverart)));

        let links = match &track.hub {
            Some(hub) => Provider::ALL
                .iter()
                .filter_map(|&provider| {
                    hub.resolve(provider)
                        .map(|url| StreamingLink { provider, url })
                })
                .collect(),
            None => Vec::new(),
        };

        RecognizedTrack {
            title: track.title.unwrap_or_else(|| "Unknown".to_string()),
            artist: track.subtitle.unwrap_or_else(|| "Unknown".to_string()),
            cover_url,
            key: non_empty(&track.key),
            links,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> RecognizedTrack {
        serde_json::from_value::<ShazamTrack>(value).unwrap().into()
    }

    #[test]
    fn test_spotify_deep_link_rewrite() {
        assert_eq!(
            spotify_track_url("spotify:track:ABC123").as_deref(),
            Some("https://open.spotify.com/track/ABC123")
        );
        assert_eq!(spotify_track_url("spotify:search:ABC"), None);
        assert_eq!(spotify_track_url("spotify:track:"), None);
    }

    #[test]
    fn test_full_track() {
        let track = parse(json!({
            "key": "5933917",
            "title": "Around the World",
            "subtitle": "Daft Punk",
            "images": {
                "coverart": "https://img/cover.jpg",
                "coverarthq": "https://img/cover_hq.jpg"
            },
            "hub": {
                "providers": [
                    {"type": "DEEZER", "actions": [{"type": "uri", "uri": "deezer-query://x"}]},
                    {"type": "SPOTIFY", "actions": [
                        {"type": "uri", "uri": "spotify:search:Around%20the%20World"},
                        {"type": "uri", "uri": "spotify:track:ABC123"},
                        {"type": "uri", "uri": "spotify:track:SECOND"}
                    ]}
                ],
                "options": [
                    {"providername": "applemusic", "actions": [
                        {"type": "applemusicplay", "uri": ""},
                        {"type": "applemusicopen", "uri": "https://music.apple.com/track/1"}
                    ]}
                ]
            }
        }));

        assert_eq!(track.title, "Around the World");
        assert_eq!(track.artist, "Daft Punk");
        assert_eq!(track.cover_url.as_deref(), Some("https://img/cover_hq.jpg"));
        assert_eq!(track.key.as_deref(), Some("5933917"));
        assert_eq!(
            track.link(Provider::Spotify),
            Some("https://open.spotify.com/track/ABC123")
        );
        assert_eq!(
            track.link(Provider::AppleMusic),
            Some("https://music.apple.com/track/1")
        );
    }

    #[test]
    fn test_sparse_track_defaults() {
        let track = parse(json!({"images": {"coverarthq": "", "coverart": "https://img/c.jpg"}}));

        assert_eq!(track.title, "Unknown");
        assert_eq!(track.artist, "Unknown");
        assert_eq!(track.cover_url.as_deref(), Some("https://img/c.jpg"));
        assert!(track.links.is_empty());
    }
}
