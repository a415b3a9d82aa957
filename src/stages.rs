// ===========================================================================
// Etapas del embudo: Lead → Contacto → Cita → Venta Bruta → Escrituración
//
// El orden es la columna vertebral del embudo y no se reordena.
// ===========================================================================

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EmbudoError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Etapa {
    Lead,
    Contacto,
    Cita,
    VentaBruta,
    Escrituracion,
}

pub struct StageDefinition {
    pub etapa:    Etapa,
    pub label:    &'static str,
    /// sinónimos de columna, en orden de prioridad
    pub columns:  &'static [&'static str],
    pub requires: Option<Etapa>,
}

pub static STAGES: [StageDefinition; 5] = [
    StageDefinition {
        etapa:    Etapa::Lead,
        label:    "Lead",
        columns:  &["fecha_registro", "fecha_de_registro", "registro"],
        requires: None,
    },
    StageDefinition {
        etapa:    Etapa::Contacto,
        label:    "Contacto",
        columns:  &["fecha_contacto", "fecha_de_contacto", "contacto"],
        requires: None,
    },
    StageDefinition {
        etapa:    Etapa::Cita,
        label:    "Cita",
        columns:  &["fecha_cita", "fecha_de_cita", "cita"],
        requires: Some(Etapa::Contacto),
    },
    StageDefinition {
        etapa:    Etapa::VentaBruta,
        label:    "Venta Bruta",
        columns:  &["fecha_venta_bruta", "fecha_de_venta_bruta", "venta_bruta", "venta"],
        requires: Some(Etapa::Cita),
    },
    StageDefinition {
        etapa:    Etapa::Escrituracion,
        label:    "Escrituracion",
        columns:  &["fecha_escrituracion", "fecha_de_escrituracion", "escrituracion"],
        requires: Some(Etapa::VentaBruta),
    },
];

/// Etapas posteriores al registro, con fecha propia en cada lead.
pub const TRACKED: [Etapa; 4] = [
    Etapa::Contacto,
    Etapa::Cita,
    Etapa::VentaBruta,
    Etapa::Escrituracion,
];

impl Etapa {
    pub fn definition(self) -> &'static StageDefinition {
        &STAGES[self as usize]
    }

    pub fn label(self) -> &'static str {
        self.definition().label
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Etapa::Lead          => "lead",
            Etapa::Contacto      => "contacto",
            Etapa::Cita          => "cita",
            Etapa::VentaBruta    => "venta_bruta",
            Etapa::Escrituracion => "escrituracion",
        }
    }

    /// Posición dentro de `TRACKED`; `Lead` no tiene fecha de etapa.
    pub fn tracked_index(self) -> Option<usize> {
        (self as usize).checked_sub(1)
    }
}

impl fmt::Display for Etapa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Etapa {
    type Err = EmbudoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match crate::schema::normalize_name(s).as_str() {
            "lead"          => Ok(Etapa::Lead),
            "contacto"      => Ok(Etapa::Contacto),
            "cita"          => Ok(Etapa::Cita),
            "venta_bruta"   => Ok(Etapa::VentaBruta),
            "escrituracion" => Ok(Etapa::Escrituracion),
            _ => Err(EmbudoError::UnknownStage(s.to_string())),
        }
    }
}
