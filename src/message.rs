use serde::Serialize;

use crate::models::EventId;

#[derive(Debug, Serialize)]
pub enum AppSuccess {
    UploadedPhoto,
    Approved,
    Rejected,
    ArchivedEvent { archived: usize },
    DeletedArchived { filename: String },
    DeletedEvent(EventId),
    DeletedAll { deleted: usize },
    CleanedDemo,
    NothingToClean,
}

impl AppSuccess {
    pub fn message(&self) -> String {
        match self {
            AppSuccess::UploadedPhoto => "¡Foto subida con éxito!".to_string(),
            AppSuccess::Approved => "Imagen aprobada".to_string(),
            AppSuccess::Rejected => "Imagen rechazada".to_string(),
            AppSuccess::ArchivedEvent { archived } => format!("{archived} fotos archivadas correctamente"),
            AppSuccess::DeletedArchived { filename } => format!("Foto {filename} eliminada permanentemente"),
            AppSuccess::DeletedEvent(event_id) => format!("Evento {event_id} eliminado completamente"),
            AppSuccess::DeletedAll { deleted } => format!("{deleted} fotos borradas exitosamente"),
            AppSuccess::CleanedDemo => "Limpieza completada exitosamente".to_string(),
            AppSuccess::NothingToClean => "No se encontraron fotos de demo para limpiar".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(AppSuccess::ArchivedEvent { archived: 3 }.message(), "3 fotos archivadas correctamente");
        assert_eq!(
            AppSuccess::DeletedEvent(EventId::new("boda")).message(),
            "Evento boda eliminado completamente"
        );
    }
}
