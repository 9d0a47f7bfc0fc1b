//! Reference vocabularies and sample data
//!
//! Concepts, techniques and instructions are static tables created before
//! any requirement. The sample requirements and their links reproduce a small
//! hand-curated graph useful for demos and tests.

use crate::domain::graph::{
    ConceptFields, EdgeRequest, InstructionFields, NewEntity, NodeRef, RelationshipKind,
    RequirementFields, TechniqueFields,
};
use crate::error::Result;

fn concept(id: &str, name: &str, definition: &str, source: &str, embedding: &[f64]) -> NewEntity {
    let entity = NewEntity::concept(
        id,
        ConceptFields::new(name)
            .with_definition(definition)
            .with_source(source),
    );
    with_vector(entity, embedding)
}

fn technique(
    id: &str,
    name: &str,
    description: &str,
    category: &str,
    source: &str,
    embedding: &[f64],
) -> NewEntity {
    let entity = NewEntity::technique(
        id,
        TechniqueFields::new(name)
            .with_description(description)
            .with_category(category)
            .with_source(source),
    );
    with_vector(entity, embedding)
}

fn instruction(id: &str, text: &str, context: &str, source: &str, embedding: &[f64]) -> NewEntity {
    let entity = NewEntity::instruction(
        id,
        InstructionFields::new(text)
            .with_context(context)
            .with_source(source),
    );
    with_vector(entity, embedding)
}

fn with_vector(entity: NewEntity, embedding: &[f64]) -> NewEntity {
    let model = entity.embedding_model.clone();
    entity.with_embedding(embedding.to_vec(), model)
}

/// Concepts of the requirements-engineering vocabulary
pub fn concepts() -> Vec<NewEntity> {
    vec![
        concept(
            "C001",
            "Requisito Funcional",
            "Um requisito que descreve uma função específica do sistema.",
            "IEEE Std 830",
            &[0.311, -0.244, 0.665],
        ),
        concept(
            "C002",
            "Autenticação",
            "Processo de verificação da identidade de um usuário.",
            "Literatura de Segurança",
            &[0.521, -0.134, 0.445],
        ),
        concept(
            "C003",
            "Stakeholder",
            "Qualquer pessoa ou organização que é afetada pelo sistema.",
            "Sommerville (2011)",
            &[0.221, -0.534, 0.775],
        ),
        concept(
            "C004",
            "Requisito Não-Funcional",
            "Um requisito que restringe o sistema ou define um atributo de qualidade.",
            "IEEE Std 830",
            &[],
        ),
        concept(
            "C005",
            "Segurança",
            "Proteção do sistema e dos dados contra acesso e uso não autorizados.",
            "ISO/IEC 25010",
            &[],
        ),
        concept(
            "C006",
            "Desempenho",
            "Capacidade de responder dentro de limites de tempo e de uso de recursos.",
            "ISO/IEC 25010",
            &[],
        ),
        concept(
            "C007",
            "Usabilidade",
            "Grau em que o sistema é usado com eficácia, eficiência e satisfação.",
            "ISO/IEC 25010",
            &[],
        ),
    ]
}

/// Elicitation, specification and validation techniques
pub fn techniques() -> Vec<NewEntity> {
    vec![
        technique(
            "TECH001",
            "Entrevistas",
            "Coleta de requisitos por meio de entrevistas com stakeholders.",
            "Elicitação",
            "Sommerville (2011)",
            &[0.223, -0.316, 0.444],
        ),
        technique(
            "TECH002",
            "Casos de Uso",
            "Técnica para capturar requisitos funcionais através de cenários.",
            "Especificação",
            "Jacobson et al.",
            &[0.423, -0.216, 0.644],
        ),
        technique(
            "TECH003",
            "Prototipação",
            "Criação de versões preliminares do sistema para validação.",
            "Validação",
            "Literatura de ES",
            &[0.523, -0.116, 0.844],
        ),
        technique(
            "TECH004",
            "Questionários",
            "Coleta de requisitos de muitos stakeholders por meio de questionários.",
            "Elicitação",
            "Kotonya & Sommerville",
            &[],
        ),
        technique(
            "TECH005",
            "Inspeção de Requisitos",
            "Revisão sistemática do documento de requisitos em busca de defeitos.",
            "Validação",
            "Sommerville (2011)",
            &[],
        ),
    ]
}

/// Guidelines from the literature
pub fn instructions() -> Vec<NewEntity> {
    vec![
        instruction(
            "INST001",
            "Os requisitos devem ser claros e verificáveis.",
            "Especificação",
            "Sommerville (2011)",
            &[0.512, -0.122, 0.211],
        ),
        instruction(
            "INST002",
            "Entrevistar stakeholders para elicitar requisitos.",
            "Elicitação",
            "Kotonya & Sommerville",
            &[0.612, -0.222, 0.311],
        ),
        instruction(
            "INST003",
            "Validar requisitos com protótipos.",
            "Validação",
            "Davis (1993)",
            &[0.412, -0.322, 0.411],
        ),
        instruction(
            "INST004",
            "Requisitos não-funcionais devem ser quantificados e mensuráveis.",
            "Especificação",
            "Sommerville (2011)",
            &[],
        ),
        instruction(
            "INST005",
            "Revisar os requisitos com os stakeholders antes da aprovação.",
            "Validação",
            "Kotonya & Sommerville",
            &[],
        ),
    ]
}

/// Every reference node, concepts first
pub fn reference_entities() -> Vec<NewEntity> {
    let mut entities = concepts();
    entities.extend(techniques());
    entities.extend(instructions());
    entities
}

fn link(kind: RelationshipKind, from: NodeRef, to: NodeRef) -> Result<EdgeRequest> {
    EdgeRequest::new(kind, from, to)
}

/// Explicit links among the reference nodes
pub fn reference_links() -> Result<Vec<EdgeRequest>> {
    use crate::domain::graph::RelationshipKind::{AppliesTo, Follows, RefersTo, SuggestsTechnique};

    let c = NodeRef::concept;
    let t = NodeRef::technique;
    let i = NodeRef::instruction;

    Ok(vec![
        link(RefersTo, i("INST001"), c("C001"))?,
        link(RefersTo, i("INST002"), c("C003"))?,
        link(RefersTo, i("INST004"), c("C004"))?,
        link(RefersTo, i("INST005"), c("C003"))?,
        link(AppliesTo, t("TECH001"), c("C003"))?,
        link(AppliesTo, t("TECH002"), c("C001"))?,
        link(AppliesTo, t("TECH003"), c("C001"))?,
        link(AppliesTo, t("TECH003"), c("C007"))?,
        link(AppliesTo, t("TECH004"), c("C003"))?,
        link(AppliesTo, t("TECH005"), c("C001"))?,
        link(AppliesTo, i("INST004"), c("C006"))?,
        link(SuggestsTechnique, i("INST002"), t("TECH001"))?,
        link(SuggestsTechnique, i("INST003"), t("TECH003"))?,
        link(SuggestsTechnique, i("INST005"), t("TECH005"))?,
        link(Follows, t("TECH001"), i("INST002"))?,
        link(Follows, t("TECH002"), i("INST001"))?,
        link(Follows, t("TECH003"), i("INST003"))?,
        link(Follows, t("TECH005"), i("INST005"))?,
    ])
}

/// Hand-written requirements used when no dataset is given
pub fn sample_requirements() -> Vec<NewEntity> {
    let requirement = |id: &str, fields: RequirementFields, embedding: &[f64]| {
        with_vector(NewEntity::requirement(id, fields), embedding)
    };

    vec![
        requirement(
            "REQ001",
            RequirementFields::new("O sistema deve permitir que o usuário redefina a senha via e-mail.")
                .with_summary("Redefinição de senha por email")
                .with_type("funcional")
                .with_source("ProjetoX")
                .with_domain("segurança"),
            &[0.123, -0.456, 0.789],
        ),
        requirement(
            "REQ002",
            RequirementFields::new("O sistema deve autenticar usuários através de login e senha.")
                .with_summary("Autenticação básica")
                .with_type("funcional")
                .with_source("ProjetoX")
                .with_domain("segurança"),
            &[0.223, -0.356, 0.889],
        ),
        requirement(
            "REQ003",
            RequirementFields::new("O sistema deve responder em menos de 2 segundos.")
                .with_summary("Performance do sistema")
                .with_type("não-funcional")
                .with_source("ProjetoY")
                .with_domain("performance"),
            &[0.323, -0.256, 0.989],
        ),
    ]
}

/// Curated links between the sample requirements and the reference nodes
pub fn sample_links() -> Result<Vec<EdgeRequest>> {
    use crate::domain::graph::RelationshipKind::{IsRelatedTo, SupportedBy, UsesTechnique};

    let r = NodeRef::requirement;
    let c = NodeRef::concept;

    Ok(vec![
        link(IsRelatedTo, r("REQ001"), c("C002"))?,
        link(IsRelatedTo, r("REQ002"), c("C002"))?,
        link(IsRelatedTo, r("REQ001"), c("C001"))?,
        link(IsRelatedTo, r("REQ002"), c("C001"))?,
        link(UsesTechnique, r("REQ001"), NodeRef::technique("TECH001"))?,
        link(UsesTechnique, r("REQ002"), NodeRef::technique("TECH002"))?,
        link(SupportedBy, r("REQ001"), NodeRef::instruction("INST001"))?,
        link(SupportedBy, r("REQ002"), NodeRef::instruction("INST001"))?,
    ])
}
