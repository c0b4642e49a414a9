use std::collections::BTreeMap;
use std::io::Read;

use serde::{Deserialize, Serialize};

use super::domain::UserId;

/// Contact and location data for a registered patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientProfile {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub municipality: String,
}

/// A volunteer professional and the slot they draw from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfessionalProfile {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub specialty: String,
    pub state: String,
    pub municipality: String,
    #[serde(default)]
    pub practice_location: Option<String>,
}

/// Identity store consulted by the matching engine. Registration lives elsewhere.
pub trait IdentityDirectory: Send + Sync {
    fn patient(&self, id: UserId) -> Result<Option<PatientProfile>, DirectoryError>;
    fn professional(&self, id: UserId) -> Result<Option<ProfessionalProfile>, DirectoryError>;
    fn has_professional(
        &self,
        specialty: &str,
        state: &str,
        municipality: &str,
    ) -> Result<bool, DirectoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("identity directory unavailable: {0}")]
    Unavailable(String),
    #[error("invalid directory seed: {0}")]
    InvalidSeed(#[from] serde_json::Error),
}

/// JSON shape accepted by [`InMemoryDirectory::from_reader`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectorySeed {
    #[serde(default)]
    pub patients: Vec<PatientProfile>,
    #[serde(default)]
    pub professionals: Vec<ProfessionalProfile>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    patients: BTreeMap<UserId, PatientProfile>,
    professionals: BTreeMap<UserId, ProfessionalProfile>,
}

impl InMemoryDirectory {
    pub fn from_seed(seed: DirectorySeed) -> Self {
        Self {
            patients: seed
                .patients
                .into_iter()
                .map(|patient| (patient.id, patient))
                .collect(),
            professionals: seed
                .professionals
                .into_iter()
                .map(|professional| (professional.id, professional))
                .collect(),
        }
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DirectoryError> {
        let seed: DirectorySeed = serde_json::from_reader(reader)?;
        Ok(Self::from_seed(seed))
    }

    /// Two professionals, three patients, used by the demo and local runs.
    pub fn sample() -> Self {
        Self::from_seed(DirectorySeed {
            professionals: vec![
                ProfessionalProfile {
                    id: UserId(1),
                    name: "Dr. João Silva".to_string(),
                    email: "dr.joao@example.com".to_string(),
                    phone: Some("11988887777".to_string()),
                    specialty: "Cardiology".to_string(),
                    state: "SP".to_string(),
                    municipality: "São Paulo".to_string(),
                    practice_location: Some("Clínica Coração Saudável".to_string()),
                },
                ProfessionalProfile {
                    id: UserId(2),
                    name: "Dra. Maria Oliveira".to_string(),
                    email: "dra.maria@example.com".to_string(),
                    phone: Some("21999998888".to_string()),
                    specialty: "Dermatology".to_string(),
                    state: "RJ".to_string(),
                    municipality: "Rio de Janeiro".to_string(),
                    practice_location: Some("Clínica Pele Limpa".to_string()),
                },
            ],
            patients: vec![
                PatientProfile {
                    id: UserId(3),
                    name: "Ana Souza".to_string(),
                    email: "ana@example.com".to_string(),
                    phone: Some("11977776666".to_string()),
                    state: "SP".to_string(),
                    municipality: "São Paulo".to_string(),
                },
                PatientProfile {
                    id: UserId(4),
                    name: "Carlos Pereira".to_string(),
                    email: "carlos@example.com".to_string(),
                    phone: Some("11955554444".to_string()),
                    state: "SP".to_string(),
                    municipality: "São Paulo".to_string(),
                },
                PatientProfile {
                    id: UserId(5),
                    name: "Beatriz Lima".to_string(),
                    email: "beatriz@example.com".to_string(),
                    phone: Some("21944443333".to_string()),
                    state: "RJ".to_string(),
                    municipality: "Rio de Janeiro".to_string(),
                },
            ],
        })
    }

    pub fn insert_patient(&mut self, patient: PatientProfile) {
        self.patients.insert(patient.id, patient);
    }

    pub fn insert_professional(&mut self, professional: ProfessionalProfile) {
        self.professionals.insert(professional.id, professional);
    }
}

impl IdentityDirectory for InMemoryDirectory {
    fn patient(&self, id: UserId) -> Result<Option<PatientProfile>, DirectoryError> {
        Ok(self.patients.get(&id).cloned())
    }

    fn professional(&self, id: UserId) -> Result<Option<ProfessionalProfile>, DirectoryError> {
        Ok(self.professionals.get(&id).cloned())
    }

    fn has_professional(
        &self,
        specialty: &str,
        state: &str,
        municipality: &str,
    ) -> Result<bool, DirectoryError> {
        Ok(self.professionals.values().any(|professional| {
            professional.specialty == specialty
                && professional.state == state
                && professional.municipality == municipality
        }))
    }
}
