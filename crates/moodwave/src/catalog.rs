//! Read-only track catalog and the grouping policies used to build queues.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Energetic,
    Chill,
    Focus,
    Melancholy,
    Upbeat,
}

/// Immutable catalog record. Identity is `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub source_uri: String,
    #[serde(default)]
    pub art_uri: String,
    /// Seconds, as listed in the catalog. Used until metadata reports the real duration.
    #[serde(default)]
    pub duration_hint: f64,
    pub mood: Mood,
    #[serde(default)]
    pub accent_color: String,
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub release_year: Option<u16>,
}

/// Equivalence class used when a new queue is derived from a selected track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueuePolicy {
    #[default]
    Mood,
    Artist,
    Album,
}

impl QueuePolicy {
    pub fn same_group(self, a: &Track, b: &Track) -> bool {
        match self {
            Self::Mood => a.mood == b.mood,
            Self::Artist => a.artist == b.artist,
            Self::Album => a.album == b.album,
        }
    }
}

/// Ordered, shared, never mutated.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tracks: Rc<[Track]>,
}

impl Catalog {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self {
            tracks: tracks.into(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let tracks: Vec<Track> = serde_json::from_str(json)?;
        Ok(Self::new(tracks))
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn find(&self, id: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.tracks.iter().position(|t| t.id == id)
    }

    pub fn by_mood(&self, mood: Mood) -> Vec<Track> {
        self.tracks.iter().filter(|t| t.mood == mood).cloned().collect()
    }

    /// Every track in the same group as `track`, in catalog order.
    pub fn grouped_with(&self, track: &Track, policy: QueuePolicy) -> Vec<Track> {
        self.tracks
            .iter()
            .filter(|t| policy.same_group(t, track))
            .cloned()
            .collect()
    }

    /// Same-mood suggestions, excluding `track` itself.
    pub fn recommended_for(&self, track: &Track, limit: usize) -> Vec<Track> {
        self.tracks
            .iter()
            .filter(|t| t.mood == track.mood && t.id != track.id)
            .take(limit)
            .cloned()
            .collect()
    }
}

/// Formats seconds as `m:ss`.
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub fn track(id: &str, mood: Mood) -> Track {
        Track {
            id: id.to_string(),
            title: format!("Title {id}"),
            artist: format!("Artist of {mood:?}"),
            album: "Album".to_string(),
            source_uri: format!("https://cdn.test/{id}.mp3"),
            art_uri: String::new(),
            duration_hint: 200.0,
            mood,
            accent_color: "#ffffff".to_string(),
            genre: String::new(),
            release_year: None,
        }
    }

    /// Ten tracks cycling through the five moods, like the demo catalog.
    pub fn demo_catalog() -> Catalog {
        let moods = [
            Mood::Energetic,
            Mood::Chill,
            Mood::Focus,
            Mood::Melancholy,
            Mood::Upbeat,
        ];
        Catalog::new(
            (1..=10)
                .map(|i| track(&format!("track-{i}"), moods[(i - 1) % moods.len()]))
                .collect(),
        )
    }

    #[test]
    fn groups_by_mood_in_catalog_order() {
        let catalog = demo_catalog();
        let focus = catalog.find("track-3").unwrap().clone();
        let ids: Vec<_> = catalog
            .grouped_with(&focus, QueuePolicy::Mood)
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, ["track-3", "track-8"]);
        assert_eq!(catalog.by_mood(Mood::Focus).len(), 2);
    }

    #[test]
    fn recommendations_skip_the_track_itself() {
        let catalog = demo_catalog();
        let t = catalog.find("track-1").unwrap().clone();
        let recs = catalog.recommended_for(&t, 3);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].id, "track-6");
    }

    #[test]
    fn recommendations_match_on_mood_not_genre() {
        let mut seed = track("seed", Mood::Focus);
        seed.genre = "ambient".into();
        let mut same_genre = track("same-genre", Mood::Energetic);
        same_genre.genre = "ambient".into();
        let same_mood = track("same-mood", Mood::Focus);
        let catalog = Catalog::new(vec![seed.clone(), same_genre, same_mood]);
        let ids: Vec<_> = catalog.recommended_for(&seed, 3).into_iter().map(|t| t.id).collect();
        assert_eq!(ids, ["same-mood"]);
    }

    #[test]
    fn parses_camel_case_json() {
        let json = r#"[{"id":"a","title":"A","artist":"X","album":"Y",
            "sourceUri":"a.mp3","durationHint":245,"mood":"focus","releaseYear":2023}]"#;
        let catalog = Catalog::from_json(json).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.tracks()[0].mood, Mood::Focus);
        assert_eq!(catalog.tracks()[0].release_year, Some(2023));
        assert_eq!(catalog.position_of("a"), Some(0));
        assert!(Catalog::from_json("[{}]").is_err());
    }

    #[test]
    fn formats_time() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(65.9), "1:05");
        assert_eq!(format_time(245.0), "4:05");
        assert_eq!(format_time(f64::NAN), "0:00");
        assert_eq!(format_time(-3.0), "0:00");
    }
}
