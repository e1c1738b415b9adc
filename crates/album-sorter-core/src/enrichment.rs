use crate::types::AlbumIdentity;

/// Extra release details from an outside catalog
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enrichment {
    pub label: Option<String>,
    pub catalog_number: Option<String>,
    pub year: Option<u16>,
}

/// Optional lookup run after identity resolution. Implementations must not
/// block for long; a `None` leaves the identity as it was.
pub trait Enricher: Send + Sync {
    fn lookup(&self, artist: &str, title: &str, year: Option<u16>) -> Option<Enrichment>;
}

/// Default enricher, never finds anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEnrichment;

impl Enricher for NoEnrichment {
    fn lookup(&self, _artist: &str, _title: &str, _year: Option<u16>) -> Option<Enrichment> {
        None
    }
}

/// Fill fields the identity lacks; values already present are kept
pub fn enrich(identity: &mut AlbumIdentity, enricher: &dyn Enricher) {
    let Some(found) = enricher.lookup(&identity.album_artist, &identity.album_title, identity.year)
    else {
        return;
    };
    if identity.label.is_none() {
        identity.label = found.label;
    }
    if identity.catalog_number.is_none() {
        identity.catalog_number = found.catalog_number;
    }
    if identity.year.is_none() {
        identity.year = found.year;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    impl Enricher for Fixed {
        fn lookup(&self, _: &str, _: &str, _: Option<u16>) -> Option<Enrichment> {
            Some(Enrichment {
                label: Some("Warp".into()),
                catalog_number: Some("WARP30".into()),
                year: Some(1995),
            })
        }
    }

    #[test]
    fn test_enrich_fills_only_missing() {
        let mut identity = AlbumIdentity::new("Autechre", "Tri Repetae");
        identity.year = Some(1996);
        enrich(&mut identity, &Fixed);
        assert_eq!(identity.label.as_deref(), Some("Warp"));
        assert_eq!(identity.catalog_number.as_deref(), Some("WARP30"));
        assert_eq!(identity.year, Some(1996));
    }

    #[test]
    fn test_no_enrichment() {
        let mut identity = AlbumIdentity::new("A", "B");
        enrich(&mut identity, &NoEnrichment);
        assert_eq!(identity, AlbumIdentity::new("A", "B"));
    }
}
