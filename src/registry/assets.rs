//! Asset list helpers

use crate::routing::Asset;

use std::collections::HashMap;

/// First candidate with the same origin chain and origin denom
pub fn find_equivalent_asset<'a>(asset: &Asset, candidates: &'a [Asset]) -> Option<&'a Asset> {
    candidates.iter().find(|c| c.is_equivalent(asset))
}

/// Asset listed on `chain_id` with `denom`
pub fn find_asset<'a>(assets: &'a HashMap<String, Vec<Asset>>, denom: &str, chain_id: &str) -> Option<&'a Asset> {
    assets.get(chain_id)?.iter().find(|a| a.denom == denom)
}

/// Keep only assets with complete display metadata
pub fn filter_assets_with_metadata(assets: &[Asset]) -> Vec<Asset> {
    assets.iter().filter(|a| a.has_metadata()).cloned().collect()
}

/// Assets issued on the chain they are listed on
pub fn native_assets(assets: &HashMap<String, Vec<Asset>>) -> Vec<Asset> {
    let mut native: Vec<Asset> = assets
        .values()
        .flatten()
        .filter(|a| a.is_native())
        .cloned()
        .collect();
    native.sort_by(|a, b| (&a.chain_id, &a.denom).cmp(&(&b.chain_id, &b.denom)));
    native
}

/// Metadata-complete assets of one chain with unambiguous display symbols
///
/// When a symbol occurs more than once on a chain, each occurrence is prefixed
/// with its origin chain's display name (or origin chain id when unknown).
pub fn display_assets(assets: &[Asset], chain_names: &HashMap<String, String>) -> Vec<Asset> {
    filter_assets_with_metadata(assets)
        .into_iter()
        .map(|mut asset| {
            let duplicates = assets.iter().filter(|a| a.symbol == asset.symbol).count();
            if duplicates > 1 {
                let origin = chain_names
                    .get(&asset.origin_chain_id)
                    .cloned()
                    .unwrap_or_else(|| asset.origin_chain_id.clone());
                asset.symbol = asset.symbol.map(|s| format!("{} {}", origin, s));
            }
            asset
        })
        .collect()
}
