use crate::results::SentimentTally;

/// Closing instructions of the aggregate prompt.
pub const GLOBAL_INSTRUCTIONS: &str = "Proporciona un análisis interpretado en un solo párrafo, \
con texto limpio y lenguaje sencillo, sin incluir listas ni datos numéricos dentro de la explicación. \
Describe de manera general qué significado tiene el resultado obtenido, \
qué tan fuerte es la polarización del público, \
qué nivel aproximado de confiabilidad podría tener la tendencia observada y \
qué conclusiones razonables se pueden tomar del panorama completo.";

/// Prompt asking for one interpretation of the cross-source tally.
pub fn global_prompt(tally: &SentimentTally) -> String {
    format!(
        "Aquí tienes un resumen de sentimiento agregado de múltiples redes sociales:\n\n\
         - Positivos: {}\n\
         - Negativos: {}\n\
         - Neutrales: {}\n\n\
         Total analizado: {}\n\
         Sentimiento predominante: {}\n\n\
         {}",
        tally.positive,
        tally.negative,
        tally.neutral,
        tally.total,
        tally.predominant().label().to_lowercase(),
        GLOBAL_INSTRUCTIONS
    )
}
