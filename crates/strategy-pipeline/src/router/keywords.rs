//! Keyword tables used by the Router
//!
//! Keywords match on word prefixes of the lower-cased message, so
//! "impuesto" also covers "impuestos".

use crate::contracts::domains;

/// Domains in detection priority order, each with its keyword list
pub const DOMAIN_KEYWORDS: [(&str, &[&str]); 5] = [
    (
        domains::MARKET,
        &[
            "mercado", "precio", "ventas", "vender", "comprar", "compra", "inversión",
            "inversion", "villa", "propiedad", "inmueble", "vivienda", "alquiler", "valoración",
            "valoracion", "comprador", "market", "price", "property",
        ],
    ),
    (
        domains::BRAND,
        &[
            "marca", "branding", "reputación", "reputacion", "contenido", "redes", "linkedin",
            "instagram", "posicionamiento", "newsletter", "brand",
        ],
    ),
    (
        domains::TAX,
        &[
            "impuesto", "fiscal", "hacienda", "irpf", "tributación", "tributacion", "autónomo",
            "autonomo", "sociedad", "plusvalía", "plusvalia", "deducción", "deduccion", "tax",
        ],
    ),
    (
        domains::TRANSITION,
        &[
            "excedencia", "laboral", "renuncia", "renunciar", "dimitir", "dimisión", "empleo",
            "trabajo", "cgi", "transición", "transicion", "despido", "nómina", "nomina",
            "jefe", "resignation",
        ],
    ),
    (
        domains::SYSTEM,
        &[
            "sistema", "automatización", "automatizacion", "automatizar", "proceso", "flujo",
            "herramienta", "crm", "pipeline", "workflow", "plantilla", "system",
        ],
    ),
];

/// Single-word markers of a comparative or multi-part query
pub const COMPLEXITY_WORDS: &[&str] = &[
    "comparar", "compara", "comparativa", "versus", "vs", "ventajas", "desventajas", "pros",
    "contras", "alternativas", "estrategia", "escenarios",
];

/// Multi-word complexity markers, matched as substrings
pub const COMPLEXITY_PHRASES: &[&str] = &["frente a", "mejor que", "peor que", "o bien"];

/// Markers of a request for experimental capabilities
pub const LAB_WORDS: &[&str] = &["lab", "laboratorio", "experimental", "beta"];

/// Lower-case the message and split it into words, dropping punctuation
/// such as the Spanish opening question mark.
pub fn tokenize(message: &str) -> Vec<String> {
    message
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whether any token starts with any of the keywords
pub fn matches_prefix(tokens: &[String], keywords: &[&str]) -> bool {
    tokens
        .iter()
        .any(|t| keywords.iter().any(|k| t.starts_with(k)))
}

/// Whether any token equals any of the keywords
pub fn matches_exact(tokens: &[String], keywords: &[&str]) -> bool {
    tokens.iter().any(|t| keywords.contains(&t.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_strips_spanish_punctuation() {
        let tokens = tokenize("¿Es buen momento para solicitar excedencia en CGI?");
        assert_eq!(tokens.first().map(String::as_str), Some("es"));
        assert_eq!(tokens.last().map(String::as_str), Some("cgi"));
        assert_eq!(tokens.len(), 8);
    }

    #[test]
    fn test_prefix_match_covers_plurals() {
        let tokens = tokenize("Pago demasiados impuestos");
        assert!(matches_prefix(&tokens, &["impuesto"]));
        assert!(!matches_exact(&tokens, &["impuesto"]));
    }

    #[test]
    fn test_keyword_tables_are_lowercase() {
        for (_, keywords) in DOMAIN_KEYWORDS {
            for k in keywords {
                assert_eq!(*k, k.to_lowercase());
            }
        }
    }
}
