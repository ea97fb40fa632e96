use serde::Serialize;

pub mod igdb;
pub mod musicbrainz;
pub mod openlibrary;
pub mod tmdb;

pub use igdb::IgdbClient;
pub use musicbrainz::MusicBrainzClient;
pub use openlibrary::OpenLibraryClient;
pub use tmdb::TmdbClient;

/// Queries shorter than this skip the network call and return nothing.
pub const MIN_QUERY_LENGTH: usize = 2;

/// Maximum number of hits requested from a provider search.
pub const SEARCH_LIMIT: u32 = 10;

/// Cover bodies smaller than this are placeholder images, not artwork.
pub const MIN_COVER_SIZE_BYTES: usize = 1000;

/// A search hit from a metadata provider, normalized across providers.
#[derive(Debug, Clone, Serialize)]
pub struct LookupResult {
    /// Provider-side identifier, opaque outside the owning client.
    pub id: String,
    pub title: String,
    pub year: Option<i32>,
    /// Attribution line shown under the title (authors, artists, original title).
    pub byline: String,
    pub overview: String,
    pub media_type: String,
    pub cover_url: Option<String>,
    pub thumb_url: Option<String>,
}

/// Full provider payload used to prefill the media form.
#[derive(Debug, Clone, Serialize)]
pub struct LookupDetails {
    pub title: String,
    pub year: Option<i32>,
    pub overview: String,
    pub contributors: Vec<String>,
    pub genres: Vec<String>,
    pub media_type: String,
    pub cover_url: Option<String>,
    pub external_url: String,
}
