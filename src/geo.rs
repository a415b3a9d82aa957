// ===========================================================================
// Ciudad → coordenadas
//
// Tabla estática de ciudades mexicanas. Una ciudad desconocida nunca es
// error: el llamador usa el centroide nacional.
// ===========================================================================

use crate::schema::normalize_name;

/// Centro geográfico de México.
pub const CENTROIDE_NACIONAL: (f64, f64) = (23.6345, -102.5528);

pub trait CityLookup: Send + Sync {
    fn coordinates(&self, city: &str) -> Option<(f64, f64)>;

    fn coordinates_or_centroid(&self, city: Option<&str>) -> (f64, f64) {
        city.and_then(|c| self.coordinates(c)).unwrap_or(CENTROIDE_NACIONAL)
    }
}

const CIUDADES: &[(&str, f64, f64)] = &[
    ("Ciudad de México", 19.4326,  -99.1332),
    ("CDMX",             19.4326,  -99.1332),
    ("Mexico City",      19.4326,  -99.1332),
    ("Toluca",           19.2826,  -99.6557),
    ("Puebla",           19.0414,  -98.2063),
    ("Monterrey",        25.6866, -100.3161),
    ("Chihuahua",        28.6353, -106.0889),
    ("Torreón",          25.5428, -103.4068),
    ("León",             21.1221, -101.6860),
    ("Oaxaca",           17.0732,  -96.7266),
    ("Mérida",           20.9674,  -89.5926),
    ("Villahermosa",     17.9892,  -92.9475),
    ("Querétaro",        20.5888, -100.3899),
    ("Aguascalientes",   21.8853, -102.2916),
    ("Guadalajara",      20.6597, -103.3496),
    ("Tijuana",          32.5149, -117.0382),
    ("Cancún",           21.1619,  -86.8515),
    ("San Luis Potosí",  22.1565, -100.9855),
    ("Hermosillo",       29.0729, -110.9559),
    ("Saltillo",         25.4267, -100.9924),
    ("Culiacán",         24.8091, -107.3940),
    ("Morelia",          19.7060, -101.1950),
    ("Veracruz",         19.1738,  -96.1342),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct CiudadesMexico;

impl CityLookup for CiudadesMexico {
    fn coordinates(&self, city: &str) -> Option<(f64, f64)> {
        let city = city.trim();
        if city.is_empty() {
            return None;
        }
        // exacta → sin acentos ni mayúsculas; nada parcial
        if let Some(&(_, lat, lng)) = CIUDADES.iter().find(|(n, _, _)| *n == city) {
            return Some((lat, lng));
        }
        let wanted = normalize_name(city);
        CIUDADES
            .iter()
            .find(|(n, _, _)| normalize_name(n) == wanted)
            .map(|&(_, lat, lng)| (lat, lng))
    }
}
