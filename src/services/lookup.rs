use anyhow::Result;

use crate::clients::{
    IgdbClient, LookupDetails, LookupResult, MusicBrainzClient, OpenLibraryClient, TmdbClient,
};

/// The metadata catalogs a lookup request can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Tmdb,
    Igdb,
    OpenLibrary,
    MusicBrainz,
}

impl Provider {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "tmdb" => Some(Self::Tmdb),
            "igdb" => Some(Self::Igdb),
            "openlibrary" => Some(Self::OpenLibrary),
            "musicbrainz" => Some(Self::MusicBrainz),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tmdb => "tmdb",
            Self::Igdb => "igdb",
            Self::OpenLibrary => "openlibrary",
            Self::MusicBrainz => "musicbrainz",
        }
    }

    /// Service name used in user-facing error messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Tmdb => "TMDB",
            Self::Igdb => "IGDB",
            Self::OpenLibrary => "OpenLibrary",
            Self::MusicBrainz => "MusicBrainz",
        }
    }
}

/// Routes lookup calls to the provider clients behind one interface.
pub struct LookupService {
    tmdb: TmdbClient,
    igdb: IgdbClient,
    openlibrary: OpenLibraryClient,
    musicbrainz: MusicBrainzClient,
}

impl LookupService {
    #[must_use]
    pub const fn new(
        tmdb: TmdbClient,
        igdb: IgdbClient,
        openlibrary: OpenLibraryClient,
        musicbrainz: MusicBrainzClient,
    ) -> Self {
        Self {
            tmdb,
            igdb,
            openlibrary,
            musicbrainz,
        }
    }

    /// TMDB and IGDB need API credentials; the other two are always usable.
    #[must_use]
    pub fn is_configured(&self, provider: Provider) -> bool {
        match provider {
            Provider::Tmdb => self.tmdb.is_configured(),
            Provider::Igdb => self.igdb.is_configured(),
            Provider::OpenLibrary | Provider::MusicBrainz => true,
        }
    }

    pub async fn search(&self, provider: Provider, query: &str) -> Result<Vec<LookupResult>> {
        match provider {
            Provider::Tmdb => self.tmdb.search(query).await,
            Provider::Igdb => self.igdb.search(query).await,
            Provider::OpenLibrary => self.openlibrary.search(query).await,
            Provider::MusicBrainz => self.musicbrainz.search(query).await,
        }
    }

    pub async fn details(
        &self,
        provider: Provider,
        id: &str,
        year_hint: Option<i32>,
    ) -> Result<Option<LookupDetails>> {
        match provider {
            Provider::Tmdb => self.tmdb.get_details(id).await,
            Provider::Igdb => self.igdb.get_details(id).await,
            Provider::OpenLibrary => self.openlibrary.get_details(id, year_hint).await,
            Provider::MusicBrainz => self.musicbrainz.get_details(id).await,
        }
    }

    /// Fetches cover bytes after the owning client has validated the URL.
    /// `Ok(None)` means the provider has no art there (404 or placeholder).
    pub async fn download_cover(
        &self,
        provider: Provider,
        cover_url: &str,
    ) -> Result<Option<Vec<u8>>> {
        match provider {
            Provider::Tmdb => self.tmdb.download_poster(cover_url).await,
            Provider::Igdb => self.igdb.download_cover(cover_url).await,
            Provider::OpenLibrary => self.openlibrary.download_cover(cover_url).await,
            Provider::MusicBrainz => self.musicbrainz.download_cover(cover_url).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parse() {
        assert_eq!(Provider::parse("tmdb"), Some(Provider::Tmdb));
        assert_eq!(Provider::parse("igdb"), Some(Provider::Igdb));
        assert_eq!(Provider::parse("openlibrary"), Some(Provider::OpenLibrary));
        assert_eq!(Provider::parse("musicbrainz"), Some(Provider::MusicBrainz));
        assert_eq!(Provider::parse("imdb"), None);
        assert_eq!(Provider::parse(""), None);
    }

    #[test]
    fn test_provider_round_trip() {
        for provider in [
            Provider::Tmdb,
            Provider::Igdb,
            Provider::OpenLibrary,
            Provider::MusicBrainz,
        ] {
            assert_eq!(Provider::parse(provider.as_str()), Some(provider));
        }
    }
}
