use crate::models::Listing;

/// Case-insensitive substring match on symbol or display name. The query is
/// matched as given, whitespace included; only an empty query returns every
/// listing. Order is preserved.
pub fn filter_listings<'a>(listings: &'a [Listing], query: &str) -> Vec<&'a Listing> {
    let needle = query.to_lowercase();
    if needle.is_empty() {
        return listings.iter().collect();
    }

    listings
        .iter()
        .filter(|l| {
            l.symbol.to_lowercase().contains(&needle) || l.name.to_lowercase().contains(&needle)
        })
        .collect()
}
