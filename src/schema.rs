// ===========================================================================
// SchemaResolver
//
// Los nombres reales de columna no se conocen de antemano (mayúsculas,
// acentos, sinónimos). Se normaliza una vez por tabla y se resuelve por
// subcadena, probando los candidatos en el orden que pide el llamador.
// No encontrar nada es un resultado válido: la columna no existe aquí.
// ===========================================================================

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// minúsculas, sin diacríticos, espacios → `_`
pub fn normalize_name(s: &str) -> String {
    s.trim()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
        .replace(' ', "_")
}

/// Versión sin estado: útil cuando sólo hay una lista de nombres.
pub fn resolve<'a>(columns: &'a [String], candidates: &[&str]) -> Option<&'a str> {
    let resolver = SchemaResolver::new(columns);
    let hit = resolver.resolve(candidates)?;
    columns.iter().find(|c| c.as_str() == hit).map(String::as_str)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaResolver {
    // (original, normalizado) en el orden de la tabla
    columns: Vec<(String, String)>,
}

impl SchemaResolver {
    pub fn new<S: AsRef<str>>(columns: &[S]) -> Self {
        Self {
            columns: columns
                .iter()
                .map(|c| (c.as_ref().to_string(), normalize_name(c.as_ref())))
                .collect(),
        }
    }

    pub fn resolve(&self, candidates: &[&str]) -> Option<&str> {
        candidates.iter().find_map(|cand| {
            let cand = normalize_name(cand);
            if cand.is_empty() {
                return None;
            }
            self.columns
                .iter()
                .find(|(_, norm)| norm.contains(&cand))
                .map(|(orig, _)| orig.as_str())
        })
    }

    pub fn resolve_owned(&self, candidates: &[&str]) -> Option<String> {
        self.resolve(candidates).map(str::to_string)
    }

    pub fn first_column(&self) -> Option<&str> {
        self.columns.first().map(|(orig, _)| orig.as_str())
    }
}
