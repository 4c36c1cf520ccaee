use crate::error::{HaikuError, Result};
use std::path::Path;

/// Three lines of a haiku
pub type Haiku = [String; 3];

const BUILTIN: &[[&str; 3]] = &[
    ["Утренний туман", "Стелется над рекой", "Призрачным покровом"],
    ["Весенний дождик льет", "По листьям тихо бьет", "Земля благоухает"],
    ["Осенние листья", "Кружатся в вихре ветра", "Золотой ковер"],
    ["Первый снег упал", "На голые ветви", "Мир стал белоснежным"],
    ["Летний зной палит", "Цикады песни поют", "В тени прохлада"],
    ["Цветущая сакура", "Лепестки на ветру", "Весна уходит"],
    ["Зимний вечер тих", "Снег ложится на крыши", "Дым из труб плывет"],
    ["Старый пруд молчит", "Лягушка прыгнула в воду", "Всплеск в тишине"],
    ["Горная тропа", "Туман скрывает вершины", "Путник идет один"],
    ["Морские волны", "Бьются о старый причал", "Чайки кричат"],
    ["Лесная тишь", "Только дятел стучит", "В золотой листве"],
    ["Вечерний закат", "Алым светом залит", "Тихий старый сад"],
    ["Утренняя роса", "На траве серебрится", "Солнце встает"],
    ["Летний дождь прошел", "Радуга над полями", "Пахнет землей"],
    ["Осенний лист", "Падает в холодную реку", "Плывет к морю"],
    ["Весенний цветок", "Пробился сквозь снег", "Жизнь снова здесь"],
    ["Зимний ветер воет", "Над пустыми полями", "Ночь длинна"],
    ["Городской шум", "Затихает к полуночи", "Луна над крышами"],
    ["Детский смех звенит", "В весеннем саду", "Цветет вишня"],
    ["Старый дом стоит", "Под снегом тихо дремлет", "Ждет весны"],
    ["Полная луна", "Над спящим озером", "Тихо плывет"],
    ["Ночь над рекой", "Светлячки в траве", "Мерцают звезды"],
    ["Одинокий журавль", "Над болотом в тумане", "Осень пришла"],
    ["Утренний туман", "Скрывает старый мост", "Тишина вокруг"],
    ["Первый снег упал", "Дети бегут во двор", "Зима пришла"],
    ["Вечерний закат", "Над морем догорает", "Волны шепчут"],
];

/// Built-in training corpus
pub fn builtin_haiku() -> Vec<Haiku> {
    BUILTIN
        .iter()
        .map(|[first, second, third]| {
            [first.to_string(), second.to_string(), third.to_string()]
        })
        .collect()
}

/// Load a corpus from a JSON file of `[["line1", "line2", "line3"], ...]`
pub fn load_haiku_file(path: &Path) -> Result<Vec<Haiku>> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        HaikuError::TrainingError(format!("Failed to read corpus {}: {}", path.display(), e))
    })?;

    let haiku: Vec<Haiku> = serde_json::from_str(&contents).map_err(|e| {
        HaikuError::TrainingError(format!("Invalid corpus {}: {}", path.display(), e))
    })?;

    if haiku.is_empty() {
        return Err(HaikuError::TrainingError(format!(
            "Corpus {} is empty",
            path.display()
        )));
    }

    Ok(haiku)
}

/// The configured corpus, or the built-in one
pub fn get_haiku_dataset(corpus: Option<&Path>) -> Result<Vec<Haiku>> {
    match corpus {
        Some(path) => load_haiku_file(path),
        None => Ok(builtin_haiku()),
    }
}
