//! Self-contained Leaflet map of street colors and land opportunities.
//!
//! The page is generated from the store on demand and is never read back.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::config::{MapConfig, AnalysisConfig};
use crate::error::Result;
use crate::models::{OpportunityDetail, Property, PropertyStatus, StreetAnalysis, UrgencyLevel, ZoneColor};
use crate::price::format_currency;

/// Street-colored active listings per street are capped to keep the page light
const MAX_MARKERS_PER_STREET: usize = 10;
const METERS_PER_MILE: f64 = 1609.344;

#[derive(Debug, Serialize)]
struct ListingMarker {
    lat: f64,
    lon: f64,
    color: ZoneColor,
    popup: String,
}

#[derive(Debug, Serialize)]
struct OpportunityMarker {
    lat: f64,
    lon: f64,
    level: UrgencyLevel,
    score: u8,
    popup: String,
}

#[derive(Debug, Serialize)]
struct Layer {
    key: &'static str,
    label: String,
    color: &'static str,
}

#[derive(Debug, Serialize)]
struct MapData<'a> {
    name: &'a str,
    center: [f64; 2],
    zoom: u8,
    radius_meters: f64,
    layers: Vec<Layer>,
    listings: Vec<ListingMarker>,
    opportunities: Vec<OpportunityMarker>,
}

/// Renders the HTML map
#[derive(Debug, Clone)]
pub struct MapRenderer {
    map: MapConfig,
    analysis: AnalysisConfig,
}

impl MapRenderer {
    pub fn new(map: &MapConfig, analysis: &AnalysisConfig) -> Self {
        Self {
            map: map.clone(),
            analysis: analysis.clone(),
        }
    }

    /// Build the page from listings, street colors and opportunities.
    pub fn render(
        &self,
        listings: &[Property],
        streets: &[StreetAnalysis],
        opportunities: &[OpportunityDetail],
    ) -> Result<String> {
        let data = MapData {
            name: &self.map.name,
            center: [self.map.center_lat, self.map.center_lon],
            zoom: self.map.zoom,
            radius_meters: self.map.service_radius_miles * METERS_PER_MILE,
            layers: self.layers(),
            listings: listing_markers(listings, streets),
            opportunities: opportunities.iter().filter_map(opportunity_marker).collect(),
        };

        // JSON inside <script> must not close the tag early
        let json = serde_json::to_string(&data)?.replace("</", "<\\/");
        Ok(PAGE
            .replace("{{TITLE}}", &html_escape(&format!("{} Land Opportunities", self.map.name)))
            .replace("{{DATA}}", &json))
    }

    /// Render and write the page, creating parent directories
    pub fn write(
        &self,
        path: &Path,
        listings: &[Property],
        streets: &[StreetAnalysis],
        opportunities: &[OpportunityDetail],
    ) -> Result<()> {
        let html = self.render(listings, streets, opportunities)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, html)?;
        info!(path = %path.display(), "Map written");
        Ok(())
    }

    fn layers(&self) -> Vec<Layer> {
        let a = &self.analysis;
        let label = |color: ZoneColor| match color {
            ZoneColor::Green => format!("Green streets (${:.0}+/sqft)", a.green_min),
            ZoneColor::LightGreen => format!("Light green (${:.0}-{:.0}/sqft)", a.light_green_min, a.green_min),
            ZoneColor::Yellow => format!("Yellow (${:.0}-{:.0}/sqft)", a.yellow_min, a.light_green_min),
            ZoneColor::Red => format!("Red (under ${:.0}/sqft)", a.yellow_min),
        };
        let mut layers: Vec<Layer> = ZoneColor::ALL
            .into_iter()
            .map(|c| Layer {
                key: c.as_str(),
                label: label(c),
                color: c.hex(),
            })
            .collect();
        layers.extend([
            Layer {
                key: "urgent",
                label: format!("Urgent land ({}+)", a.urgent_score),
                color: "#7b2cbf",
            },
            Layer {
                key: "good",
                label: format!("Good land ({}-{})", a.good_score, a.urgent_score.saturating_sub(1)),
                color: "#3a86ff",
            },
            Layer {
                key: "normal",
                label: "Other land".to_string(),
                color: "#8d99ae",
            },
        ]);
        layers
    }
}

fn listing_markers(listings: &[Property], streets: &[StreetAnalysis]) -> Vec<ListingMarker> {
    let colors: HashMap<(String, String), ZoneColor> = streets
        .iter()
        .map(|s| ((s.city.to_lowercase(), s.street_name.to_lowercase()), s.zone_color))
        .collect();
    let mut per_street: HashMap<(String, String), usize> = HashMap::new();

    listings
        .iter()
        .filter(|p| !p.archived && p.status == PropertyStatus::Active)
        .filter_map(|p| {
            let coords = p.coordinates()?;
            let key = (p.city.to_lowercase(), p.street_name.as_deref()?.to_lowercase());
            let color = *colors.get(&key)?;
            let shown = per_street.entry(key).or_default();
            if *shown >= MAX_MARKERS_PER_STREET {
                return None;
            }
            *shown += 1;

            let mut popup = format!("<b>{}</b><br>", html_escape(&p.address));
            if let Some(price) = p.effective_price() {
                popup.push_str(&format!("Price: {}<br>", format_currency(price)));
            }
            if let Some(ppsf) = p.price_per_sqft {
                popup.push_str(&format!("$/sqft: {ppsf:.0}<br>"));
            }
            popup.push_str(&format!("Street zone: {}", color.as_str()));
            push_link(&mut popup, p.url.as_deref());

            Some(ListingMarker {
                lat: coords.lat,
                lon: coords.lon,
                color,
                popup,
            })
        })
        .collect()
}

fn opportunity_marker(detail: &OpportunityDetail) -> Option<OpportunityMarker> {
    let OpportunityDetail {
        opportunity: o,
        property: p,
    } = detail;
    let coords = p.coordinates()?;

    let mut popup = format!(
        "<b>{}</b><br>Score: {}/100 ({})<br>",
        html_escape(&p.address),
        o.urgency_score,
        o.urgency_level
    );
    if let Some(price) = p.effective_price() {
        popup.push_str(&format!("Price: {}<br>", format_currency(price)));
    }
    if let Some(acres) = p.lot_acres() {
        popup.push_str(&format!("Lot: {acres:.2} acres<br>"));
    }
    if let Some(per_acre) = o.price_per_acre {
        popup.push_str(&format!("$/acre: {}<br>", format_currency(per_acre)));
    }
    popup.push_str(&format!(
        "Zone {:.0} / Price {:.0} / Market {:.0}<br>{}",
        o.zone_score,
        o.price_score,
        o.market_score,
        html_escape(&o.recommendation)
    ));
    push_link(&mut popup, p.url.as_deref());

    Some(OpportunityMarker {
        lat: coords.lat,
        lon: coords.lon,
        level: o.urgency_level,
        score: o.urgency_score,
        popup,
    })
}

fn push_link(popup: &mut String, url: Option<&str>) {
    if let Some(url) = url.filter(|u| u.starts_with("http")) {
        popup.push_str(&format!(
            "<br><a href=\"{}\" target=\"_blank\" rel=\"noopener\">View listing</a>",
            html_escape(url)
        ));
    }
}

fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{{TITLE}}</title>
<link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css">
<script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
<style>html, body, #map { height: 100%; margin: 0; }</style>
</head>
<body>
<div id="map"></div>
<script>
const data = {{DATA}};
const map = L.map('map').setView(data.center, data.zoom);
L.tileLayer('https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png', {
  maxZoom: 19,
  attribution: '&copy; OpenStreetMap contributors'
}).addTo(map);

L.circle(data.center, {
  radius: data.radius_meters, color: '#264653', weight: 2, fill: false, dashArray: '6 6'
}).addTo(map);

const groups = {};
const overlays = {};
for (const layer of data.layers) {
  groups[layer.key] = L.layerGroup().addTo(map);
  const swatch = '<span style="color:' + layer.color + '">&#9679;</span> ';
  overlays[swatch + layer.label] = groups[layer.key];
}
const colorOf = Object.fromEntries(data.layers.map(l => [l.key, l.color]));

for (const m of data.listings) {
  L.circleMarker([m.lat, m.lon], {
    radius: 5, color: colorOf[m.color], fillOpacity: 0.8, weight: 1
  }).bindPopup(m.popup).addTo(groups[m.color]);
}
for (const o of data.opportunities) {
  L.circleMarker([o.lat, o.lon], {
    radius: 7 + o.score / 20, color: '#000', fillColor: colorOf[o.level], fillOpacity: 0.9, weight: 2
  }).bindPopup(o.popup).bindTooltip('Score ' + o.score).addTo(groups[o.level]);
}

L.control.layers(null, overlays, { collapsed: false }).addTo(map);
</script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::fixtures::{as_of, house};
    use crate::street::StreetAggregator;

    fn renderer() -> MapRenderer {
        let config = AppConfig::default();
        MapRenderer::new(&config.map, &config.analysis)
    }

    #[test]
    fn test_render_embeds_markers_and_layers() {
        let config = AppConfig::default();
        let listings = vec![house(1, "Oak Street", 400.0), house(2, "Oak Street", 380.0)];
        let streets = StreetAggregator::new(&config.analysis).aggregate(&listings, as_of());

        let html = renderer().render(&listings, &streets, &[]).unwrap();
        assert!(html.contains("leaflet.js"));
        assert!(html.contains("Green streets ($350+/sqft)"));
        assert!(html.contains("\"color\":\"green\""));
        assert!(html.contains("L.control.layers"));
        assert!(!html.contains("{{DATA}}"));
    }

    #[test]
    fn test_script_breakout_is_escaped() {
        let config = AppConfig::default();
        let mut listing = house(1, "Oak Street", 400.0);
        listing.address = "1 Oak St</script><script>alert(1)".into();
        let listings = vec![listing];
        let streets = StreetAggregator::new(&config.analysis).aggregate(&listings, as_of());

        let html = renderer().render(&listings, &streets, &[]).unwrap();
        assert_eq!(html.matches("</script>").count(), 2);
    }

    #[test]
    fn test_write_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/nested/map.html");
        renderer().write(&path, &[], &[], &[]).unwrap();
        assert!(path.is_file());
    }
}
